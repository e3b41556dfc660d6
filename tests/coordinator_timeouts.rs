// tests/coordinator_timeouts.rs
//
// Timeout semantics through the public pipeline: a single slow signal
// degrades alone, while only the overall deadline produces the `timeout`
// record. The two failure shapes must stay distinguishable in the output.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crisis_triage_engine::config::TriageConfig;
use crisis_triage_engine::patterns::{PatternHandle, PatternStore};
use crisis_triage_engine::pipeline::{AnalysisRequest, TriageEngine};
use crisis_triage_engine::result::AnalysisStatus;
use crisis_triage_engine::signals::remote::MockSignal;
use crisis_triage_engine::signals::{DynSignal, Signal, SignalRegistry, SignalScore};
use crisis_triage_engine::CrisisLevel;

/// Completes after a fixed delay with a fixed score.
struct Slow {
    name: &'static str,
    delay: Duration,
    score: f64,
}

impl Signal for Slow {
    fn evaluate<'a>(
        &'a self,
        _text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<SignalScore>> + Send + 'a>> {
        let delay = self.delay;
        let score = self.score;
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            Ok(SignalScore {
                score,
                confidence: 0.8,
                method: "slow",
                flip_candidate: false,
            })
        })
    }
    fn name(&self) -> &'static str {
        self.name
    }
}

fn engine(signals: Vec<DynSignal>, config: TriageConfig) -> TriageEngine {
    let mut registry = SignalRegistry::new();
    for s in signals {
        registry.register(s);
    }
    TriageEngine::new(config, PatternHandle::new(PatternStore::default_seed()), registry)
}

fn req(message: &str) -> AnalysisRequest {
    AnalysisRequest {
        message: message.to_string(),
        user_id: "u1".to_string(),
        channel_id: "c1".to_string(),
    }
}

#[tokio::test]
async fn one_slow_signal_degrades_without_timeout_record() {
    let mut config = TriageConfig::default();
    config.analysis.model_timeout_ms = 50;
    config.analysis.analysis_timeout_ms = 2_000;

    let eng = engine(
        vec![
            Arc::new(Slow {
                name: "slow",
                delay: Duration::from_secs(30),
                score: 0.9,
            }),
            Arc::new(MockSignal {
                score: 0.1,
                confidence: 0.9,
            }),
        ],
        config,
    );

    let r = eng.analyze(&req("checking in, everything is fine")).await;

    // The run itself finished in budget: status is ok, not timeout.
    assert_eq!(r.status, AnalysisStatus::Ok);
    assert!(!r.analysis_metadata.overall_timeout);

    // The slow signal shows up errored in the breakdown, the healthy one
    // is listed active.
    let slow = r
        .analysis_metadata
        .signal_breakdown
        .iter()
        .find(|s| s.name == "slow")
        .expect("slow signal in breakdown");
    assert_eq!(slow.error.as_deref(), Some("timeout"));
    assert!(!r.analysis_metadata.active_signals.contains(&"slow".to_string()));
    assert!(r.analysis_metadata.active_signals.contains(&"remote".to_string()));
}

#[tokio::test]
async fn overall_deadline_yields_the_conservative_timeout_record() {
    let mut config = TriageConfig::default();
    // Per-signal budget above the overall one; only the overall deadline
    // can end the run.
    config.analysis.model_timeout_ms = 60_000;
    config.analysis.analysis_timeout_ms = 80;

    let eng = engine(
        vec![Arc::new(Slow {
            name: "slow",
            delay: Duration::from_secs(30),
            score: 0.9,
        })],
        config,
    );

    let started = std::time::Instant::now();
    let r = eng.analyze(&req("checking in")).await;

    assert!(started.elapsed() < Duration::from_secs(2), "deadline must be prompt");
    assert_eq!(r.status, AnalysisStatus::Timeout);
    assert_eq!(r.crisis_level, CrisisLevel::Medium);
    assert!((r.confidence_score - 0.5).abs() < 1e-9);
    assert!(r.needs_response);
    assert!(r.requires_staff_review);
    assert!(r.analysis_metadata.overall_timeout);
}

#[tokio::test]
async fn completed_signals_survive_an_overall_timeout() {
    let mut config = TriageConfig::default();
    config.analysis.model_timeout_ms = 60_000;
    config.analysis.analysis_timeout_ms = 200;

    let eng = engine(
        vec![
            Arc::new(Slow {
                name: "slow",
                delay: Duration::from_secs(30),
                score: 0.9,
            }),
            Arc::new(MockSignal {
                score: 0.2,
                confidence: 0.9,
            }),
        ],
        config,
    );

    let r = eng.analyze(&req("checking in")).await;
    assert_eq!(r.status, AnalysisStatus::Timeout);

    // The fast signal settled before the deadline and is preserved in the
    // diagnostics even though the verdict is the conservative record.
    assert!(r
        .analysis_metadata
        .signal_breakdown
        .iter()
        .any(|s| s.name == "remote" && s.is_ok()));
}
