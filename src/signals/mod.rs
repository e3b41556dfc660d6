//! Classification signals: trait, result record, and the typed registry.
//!
//! A signal is one independent scorer (embedded heuristic, remote model, …)
//! conforming to `(text) -> (score, confidence)` with an error channel. The
//! registry replaces stringly-typed dispatch on model names: signals are
//! registered once at startup and the coordinator fans out over the set.

pub mod coordinator;
pub mod keyword;
pub mod remote;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::result::clamp01;

/// Successful output of one signal invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalScore {
    pub score: f64,
    pub confidence: f64,
    /// Tag identifying what produced the score (e.g. "keyword_fallback").
    pub method: &'static str,
    /// Set when the signal saw crisis language under negation; fusion uses
    /// this to apply the negation discount exactly once.
    pub flip_candidate: bool,
}

/// One signal's contribution to an analysis, errored or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    pub name: String,
    /// In [0, 1]; forced to 0.0 whenever `error` is set.
    pub score: f64,
    pub confidence: f64,
    pub method: String,
    #[serde(default)]
    pub flip_candidate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SignalResult {
    pub fn ok(name: impl Into<String>, s: SignalScore) -> Self {
        Self {
            name: name.into(),
            score: clamp01(s.score),
            confidence: clamp01(s.confidence),
            method: s.method.to_string(),
            flip_candidate: s.flip_candidate,
            error: None,
        }
    }

    /// Errored signals contribute zero score and zero weight to fusion.
    pub fn failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            score: 0.0,
            confidence: 0.0,
            method: "error".to_string(),
            flip_candidate: false,
            error: Some(reason.into()),
        }
    }

    pub fn timed_out(name: impl Into<String>) -> Self {
        Self::failed(name, "timeout")
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// One independent classification signal.
pub trait Signal: Send + Sync {
    /// Score the message. The coordinator bounds this with a per-signal
    /// timeout; implementations need not enforce their own deadline.
    fn evaluate<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<SignalScore>> + Send + 'a>>;

    /// Stable identifier used as the result key.
    fn name(&self) -> &'static str;
}

pub type DynSignal = Arc<dyn Signal>;

/// Typed set of registered signals, keyed by `Signal::name`.
#[derive(Clone, Default)]
pub struct SignalRegistry {
    entries: Vec<DynSignal>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a signal. A duplicate name replaces the earlier registration.
    pub fn register(&mut self, signal: DynSignal) {
        let name = signal.name();
        if self.entries.iter().any(|s| s.name() == name) {
            warn!(target: "signals", %name, "replacing already-registered signal");
            self.entries.retain(|s| s.name() != name);
        }
        self.entries.push(signal);
    }

    pub fn signals(&self) -> &[DynSignal] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, f64);

    impl Signal for Fixed {
        fn evaluate<'a>(
            &'a self,
            _text: &'a str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<SignalScore>> + Send + 'a>> {
            let score = self.1;
            Box::pin(async move {
                Ok(SignalScore {
                    score,
                    confidence: 0.9,
                    method: "fixed",
                    flip_candidate: false,
                })
            })
        }
        fn name(&self) -> &'static str {
            self.0
        }
    }

    #[test]
    fn registry_replaces_duplicates() {
        let mut reg = SignalRegistry::new();
        reg.register(Arc::new(Fixed("a", 0.1)));
        reg.register(Arc::new(Fixed("b", 0.2)));
        reg.register(Arc::new(Fixed("a", 0.9)));
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.names(), vec!["b", "a"]);
    }

    #[test]
    fn failed_result_carries_no_score() {
        let r = SignalResult::failed("x", "boom");
        assert_eq!(r.score, 0.0);
        assert_eq!(r.confidence, 0.0);
        assert!(!r.is_ok());

        let t = SignalResult::timed_out("x");
        assert_eq!(t.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn ok_result_clamps_ranges() {
        let r = SignalResult::ok(
            "x",
            SignalScore {
                score: 1.4,
                confidence: -0.1,
                method: "m",
                flip_candidate: true,
            },
        );
        assert_eq!(r.score, 1.0);
        assert_eq!(r.confidence, 0.0);
        assert!(r.flip_candidate);
        assert!(r.is_ok());
    }
}
