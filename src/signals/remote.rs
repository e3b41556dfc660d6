//! Remote classifier signal: HTTP provider + deterministic mock + factory.
//!
//! The pipeline treats the classifier as a black box `(text) -> (score,
//! confidence)` behind a timeout; this module supplies the HTTP flavor of
//! that box. Requires `TRIAGE_CLASSIFIER_API_KEY` when auth is configured.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{DynSignal, Signal, SignalRegistry, SignalScore};
use crate::signals::keyword::KeywordSignal;

/// Remote-classifier section of the triage config.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSignalCfg {
    #[serde(default)]
    pub enabled: bool,
    /// Endpoint accepting `{"text": ...}` and returning `{"score": f, "confidence": f}`.
    #[serde(default)]
    pub url: String,
    /// Optional model identifier forwarded to the service.
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for RemoteSignalCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            model: None,
        }
    }
}

/// HTTP-backed classifier signal.
pub struct RemoteSignal {
    http: reqwest::Client,
    url: String,
    model: Option<String>,
    api_key: String,
}

impl RemoteSignal {
    pub fn new(cfg: &RemoteSignalCfg) -> Self {
        let api_key = std::env::var("TRIAGE_CLASSIFIER_API_KEY").unwrap_or_default();
        let http = reqwest::Client::builder()
            .user_agent("crisis-triage-engine/0.1")
            .connect_timeout(Duration::from_secs(2))
            .timeout(Duration::from_secs(8))
            .build()
            .expect("reqwest client");
        Self {
            http,
            url: cfg.url.clone(),
            model: cfg.model.clone(),
            api_key,
        }
    }
}

#[derive(Serialize)]
struct ClassifyReq<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Deserialize)]
struct ClassifyResp {
    score: f64,
    #[serde(default = "default_remote_confidence")]
    confidence: f64,
}

fn default_remote_confidence() -> f64 {
    0.8
}

impl Signal for RemoteSignal {
    fn evaluate<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<SignalScore>> + Send + 'a>> {
        Box::pin(async move {
            if self.url.is_empty() {
                anyhow::bail!("remote classifier url not configured");
            }

            let req = ClassifyReq {
                text,
                model: self.model.as_deref(),
            };

            let mut builder = self.http.post(&self.url).json(&req);
            if !self.api_key.is_empty() {
                builder = builder.bearer_auth(&self.api_key);
            }

            let resp = builder.send().await?;
            if !resp.status().is_success() {
                anyhow::bail!("classifier returned HTTP {}", resp.status());
            }
            let body: ClassifyResp = resp.json().await?;

            Ok(SignalScore {
                score: body.score,
                confidence: body.confidence,
                method: "remote_model",
                flip_candidate: false,
            })
        })
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

/// Deterministic signal for tests and `TRIAGE_TEST_MODE=mock` runs.
#[derive(Clone)]
pub struct MockSignal {
    pub score: f64,
    pub confidence: f64,
}

impl Signal for MockSignal {
    fn evaluate<'a>(
        &'a self,
        _text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<SignalScore>> + Send + 'a>> {
        let (score, confidence) = (self.score, self.confidence);
        Box::pin(async move {
            Ok(SignalScore {
                score,
                confidence,
                method: "mock",
                flip_candidate: false,
            })
        })
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

/// Build the startup signal set: the keyword fallback is always present;
/// the remote classifier joins it when enabled (or a mock when
/// `TRIAGE_TEST_MODE=mock`).
pub fn build_registry(remote: &RemoteSignalCfg) -> SignalRegistry {
    let mut reg = SignalRegistry::new();
    reg.register(Arc::new(KeywordSignal::new()) as DynSignal);

    if std::env::var("TRIAGE_TEST_MODE").map(|v| v == "mock").unwrap_or(false) {
        reg.register(Arc::new(MockSignal {
            score: 0.0,
            confidence: 0.9,
        }));
        return reg;
    }

    if remote.enabled {
        reg.register(Arc::new(RemoteSignal::new(remote)));
    }
    reg
}
