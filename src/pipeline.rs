//! Pipeline orchestrator: one message in, one `CrisisResult` out.
//!
//! Context extraction and pattern evaluation are pure CPU work and run
//! inline; the signal coordinator runs under its own overall deadline. The
//! failure policy is conservative throughout: a coordinator timeout yields
//! the `timeout` record (medium / 0.5 / reviewed), any internal failure
//! yields the `error` record (high / 0.0 / reviewed).

use std::time::Instant;

use metrics::counter;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::TriageConfig;
use crate::context;
use crate::fusion;
use crate::level::CrisisLevel;
use crate::patterns::{anon_hash, PatternHandle};
use crate::result::{AnalysisMetadata, CrisisResult};
use crate::review;
use crate::signals::coordinator;
use crate::signals::SignalRegistry;
use crate::thresholds::{map_to_level, ThresholdTable};

/// One message to triage.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    pub message: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub channel_id: String,
}

/// The assembled engine. Cheap to clone; all shared state is behind `Arc`s.
#[derive(Clone)]
pub struct TriageEngine {
    config: TriageConfig,
    patterns: PatternHandle,
    registry: SignalRegistry,
    thresholds: ThresholdTable,
}

impl TriageEngine {
    pub fn new(config: TriageConfig, patterns: PatternHandle, registry: SignalRegistry) -> Self {
        let thresholds = config.threshold_table();
        Self {
            config,
            patterns,
            registry,
            thresholds,
        }
    }

    pub fn patterns(&self) -> &PatternHandle {
        &self.patterns
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    /// Run the full pipeline for one message. Never panics, never returns a
    /// partial record: every exit path is a complete `CrisisResult`.
    pub async fn analyze(&self, req: &AnalysisRequest) -> CrisisResult {
        let started = Instant::now();
        let mode = self.config.analysis.ensemble_mode.as_str();

        // Pure, sub-millisecond stages run inline.
        let ctx = context::extract(&req.message);
        let pattern_eval = self.patterns.evaluate(&req.message);

        // Concurrent signal fan-out under the overall budget.
        let out = coordinator::run(
            &req.message,
            &self.registry,
            self.config.model_timeout(),
            self.config.analysis_timeout(),
        )
        .await;

        let mut breakdown: Vec<_> = out.results.values().cloned().collect();
        breakdown.sort_by(|a, b| a.name.cmp(&b.name));
        let active_signals: Vec<String> = breakdown
            .iter()
            .filter(|r| r.is_ok())
            .map(|r| r.name.clone())
            .collect();

        let metadata = AnalysisMetadata {
            elapsed_ms: started.elapsed().as_millis() as u64,
            active_signals,
            signal_breakdown: breakdown,
            pattern_match_count: pattern_eval.matches.len(),
            overall_timeout: out.overall_timeout,
            ensemble_mode: mode.to_string(),
        };

        if out.overall_timeout {
            warn!(
                target: "pipeline",
                id = %anon_hash(&req.message),
                elapsed_ms = metadata.elapsed_ms,
                "analysis hit overall timeout; emitting conservative record"
            );
            counter!("triage_analyses_total", "status" => "timeout").increment(1);
            let mut result = CrisisResult::timed_out(&req.message, &req.user_id, &req.channel_id);
            result.analysis_metadata = metadata;
            return result;
        }

        let score = fusion::fuse(
            &out.results,
            pattern_eval.aggregate_confidence,
            pattern_eval.matches.len(),
            &ctx,
            &self.config.fusion,
            &self.config.signal_weights,
        );

        // Fusion clamps to [0,1]; a non-finite score can only mean corrupt
        // inputs, which takes the error branch rather than a bogus verdict.
        if !score.is_finite() {
            counter!("triage_analyses_total", "status" => "error").increment(1);
            let mut result = CrisisResult::errored(&req.message, &req.user_id, &req.channel_id);
            result.analysis_metadata = metadata;
            return result;
        }

        let thresholds = self.thresholds.set_for(mode);
        let mut level = map_to_level(score, &thresholds);

        // Safety rollup overrides the score-derived level: a critical pattern
        // or emergency consensus always reaches at least `high`.
        if pattern_eval.safety.emergency_response_triggered
            || !pattern_eval.safety.critical_patterns_detected.is_empty()
        {
            level = level.max(CrisisLevel::High);
        }

        let disagreement = review::signals_disagree(out.results.values(), &self.config.review);
        let needs_review = review::requires_review(
            level,
            score,
            &pattern_eval.safety,
            disagreement,
            &self.config.review,
            &thresholds,
        );

        let categories = pattern_eval
            .matches
            .iter()
            .map(|m| m.category.clone())
            .collect();

        counter!("triage_analyses_total", "status" => "ok").increment(1);
        info!(
            target: "pipeline",
            id = %anon_hash(&req.message),
            level = %level,
            score,
            review = needs_review,
            elapsed_ms = metadata.elapsed_ms,
            "analysis complete"
        );

        let mut result = CrisisResult::new(&req.message, &req.user_id, &req.channel_id)
            .with_level(level, score)
            .with_categories(categories);
        result.requires_staff_review = needs_review;
        result.analysis_metadata = metadata;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::PatternStore;
    use crate::result::AnalysisStatus;
    use crate::signals::remote::MockSignal;
    use crate::signals::{DynSignal, Signal, SignalScore};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;

    struct Stuck;

    impl Signal for Stuck {
        fn evaluate<'a>(
            &'a self,
            _text: &'a str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<SignalScore>> + Send + 'a>> {
            Box::pin(async {
                std::future::pending::<()>().await;
                unreachable!()
            })
        }
        fn name(&self) -> &'static str {
            "stuck"
        }
    }

    fn engine_with(signals: Vec<DynSignal>, mut config: TriageConfig) -> TriageEngine {
        let mut registry = SignalRegistry::new();
        for s in signals {
            registry.register(s);
        }
        config.analysis.ensemble_mode = "majority".to_string();
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
    async fn neutral_message_is_none_without_review() {
        let engine = engine_with(
            vec![Arc::new(MockSignal {
                score: 0.02,
                confidence: 0.9,
            })],
            TriageConfig::default(),
        );
        let r = engine.analyze(&req("What's the weather like today?")).await;
        assert_eq!(r.status, AnalysisStatus::Ok);
        assert_eq!(r.crisis_level, CrisisLevel::None);
        assert!(!r.requires_staff_review);
        assert!(!r.needs_response);
        assert!(r.detected_categories.is_empty());
    }

    #[tokio::test]
    async fn critical_pattern_escalates_and_reviews() {
        let engine = engine_with(
            vec![Arc::new(MockSignal {
                score: 0.3,
                confidence: 0.9,
            })],
            TriageConfig::default(),
        );
        let r = engine.analyze(&req("I want to kill myself")).await;
        assert_eq!(r.status, AnalysisStatus::Ok);
        assert!(r.crisis_level >= CrisisLevel::High);
        assert!(r.requires_staff_review);
        assert!(r.detected_categories.contains(&"self_harm".to_string()));
    }

    #[tokio::test]
    async fn overall_timeout_yields_conservative_record() {
        let mut config = TriageConfig::default();
        config.analysis.analysis_timeout_ms = 50;
        config.analysis.model_timeout_ms = 60_000;
        let engine = engine_with(vec![Arc::new(Stuck)], config);

        let r = engine.analyze(&req("hello there")).await;
        assert_eq!(r.status, AnalysisStatus::Timeout);
        assert_eq!(r.crisis_level, CrisisLevel::Medium);
        assert!((r.confidence_score - 0.5).abs() < 1e-9);
        assert!(r.requires_staff_review);
        assert!(r.analysis_metadata.overall_timeout);
    }

    #[tokio::test]
    async fn per_signal_timeouts_do_not_set_timeout_status() {
        let mut config = TriageConfig::default();
        config.analysis.analysis_timeout_ms = 2_000;
        config.analysis.model_timeout_ms = 50;
        let engine = engine_with(vec![Arc::new(Stuck)], config);

        let r = engine.analyze(&req("hello there")).await;
        // The signal degraded individually; the run itself finished in time.
        assert_eq!(r.status, AnalysisStatus::Ok);
        assert_eq!(r.crisis_level, CrisisLevel::None);
        assert!(!r.analysis_metadata.overall_timeout);
        assert_eq!(r.analysis_metadata.signal_breakdown.len(), 1);
        assert!(!r.analysis_metadata.signal_breakdown[0].is_ok());
    }

    #[tokio::test]
    async fn analysis_is_idempotent() {
        let engine = engine_with(
            vec![Arc::new(MockSignal {
                score: 0.4,
                confidence: 0.9,
            })],
            TriageConfig::default(),
        );
        let a = engine.analyze(&req("I feel alone and hopeless")).await;
        let b = engine.analyze(&req("I feel alone and hopeless")).await;
        assert_eq!(a.crisis_level, b.crisis_level);
        assert_eq!(a.confidence_score, b.confidence_score);
        assert_eq!(a.requires_staff_review, b.requires_staff_review);
        assert_eq!(a.detected_categories, b.detected_categories);
    }
}
