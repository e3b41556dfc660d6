//! Final analysis record returned to callers.
//!
//! One `CrisisResult` per analyzed message: crisis level + confidence +
//! staff-review decision + metadata. Immutable after construction; the
//! pipeline builds it once and never caches it across requests.

use serde::{Deserialize, Serialize};

use crate::level::CrisisLevel;
use crate::signals::SignalResult;

/// Outcome class of one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Ok,
    Timeout,
    Error,
}

/// Per-run diagnostics attached to the result. Timings are wall-clock.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// Total pipeline time in milliseconds.
    pub elapsed_ms: u64,
    /// Signals that contributed a non-error score.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub active_signals: Vec<String>,
    /// Full per-signal breakdown (including errored/timed-out signals).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signal_breakdown: Vec<SignalResult>,
    /// Number of pattern rules that fired.
    pub pattern_match_count: usize,
    /// Whether the coordinator's own deadline fired.
    pub overall_timeout: bool,
    /// Ensemble mode whose threshold table was used.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ensemble_mode: String,
}

/// Complete analysis output. This is the shape the API serializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisResult {
    pub message: String,
    pub user_id: String,
    pub channel_id: String,
    pub crisis_level: CrisisLevel,
    /// Fused crisis score in [0, 1].
    pub confidence_score: f64,
    /// Pattern categories that fired, deduplicated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detected_categories: Vec<String>,
    pub needs_response: bool,
    pub requires_staff_review: bool,
    pub analysis_metadata: AnalysisMetadata,
    pub status: AnalysisStatus,
    /// ISO 8601 creation time.
    pub analyzed_at: String,
}

impl CrisisResult {
    /// Skeleton with the given identity fields; callers fill in the verdict.
    pub fn new(message: impl Into<String>, user_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            crisis_level: CrisisLevel::None,
            confidence_score: 0.0,
            detected_categories: Vec::new(),
            needs_response: false,
            requires_staff_review: false,
            analysis_metadata: AnalysisMetadata::default(),
            status: AnalysisStatus::Ok,
            analyzed_at: iso_now(),
        }
    }

    /// Conservative record for a coordinator-level timeout: medium severity,
    /// mid confidence, always reviewed by a human.
    pub fn timed_out(message: impl Into<String>, user_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        let mut r = Self::new(message, user_id, channel_id);
        r.crisis_level = CrisisLevel::Medium;
        r.confidence_score = 0.5;
        r.needs_response = true;
        r.requires_staff_review = true;
        r.status = AnalysisStatus::Timeout;
        r.analysis_metadata.overall_timeout = true;
        r
    }

    /// Conservative record for an internal pipeline failure: high severity,
    /// zero confidence, always reviewed by a human.
    pub fn errored(message: impl Into<String>, user_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        let mut r = Self::new(message, user_id, channel_id);
        r.crisis_level = CrisisLevel::High;
        r.confidence_score = 0.0;
        r.needs_response = true;
        r.requires_staff_review = true;
        r.status = AnalysisStatus::Error;
        r
    }

    pub fn with_level(mut self, level: CrisisLevel, score: f64) -> Self {
        self.crisis_level = level;
        self.confidence_score = clamp01(score);
        self.needs_response = level.needs_response();
        self
    }

    pub fn with_categories(mut self, mut categories: Vec<String>) -> Self {
        categories.sort();
        categories.dedup();
        self.detected_categories = categories;
        self
    }
}

pub(crate) fn clamp01(x: f64) -> f64 {
    if x < 0.0 {
        0.0
    } else if x > 1.0 {
        1.0
    } else {
        x
    }
}

/// ISO 8601 timestamp for result records.
fn iso_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_result_shape() {
        let r = CrisisResult::new("hello", "u1", "c1")
            .with_level(CrisisLevel::Medium, 0.42)
            .with_categories(vec!["hopelessness".into(), "isolation".into(), "hopelessness".into()]);

        let v: serde_json::Value = serde_json::to_value(&r).unwrap();
        assert_eq!(v["crisis_level"], serde_json::json!("medium"));
        assert_eq!(v["status"], serde_json::json!("ok"));
        assert_eq!(v["needs_response"], serde_json::json!(true));

        let score = v["confidence_score"].as_f64().unwrap();
        assert!((score - 0.42).abs() < 1e-9);

        // Categories are deduplicated and sorted.
        assert_eq!(
            v["detected_categories"],
            serde_json::json!(["hopelessness", "isolation"])
        );
    }

    #[test]
    fn timeout_and_error_records_are_conservative() {
        let t = CrisisResult::timed_out("m", "u", "c");
        assert_eq!(t.status, AnalysisStatus::Timeout);
        assert_eq!(t.crisis_level, CrisisLevel::Medium);
        assert!((t.confidence_score - 0.5).abs() < 1e-9);
        assert!(t.requires_staff_review);
        assert!(t.analysis_metadata.overall_timeout);

        let e = CrisisResult::errored("m", "u", "c");
        assert_eq!(e.status, AnalysisStatus::Error);
        assert_eq!(e.crisis_level, CrisisLevel::High);
        assert_eq!(e.confidence_score, 0.0);
        assert!(e.requires_staff_review);
    }

    #[test]
    fn with_level_clamps_score() {
        let r = CrisisResult::new("m", "u", "c").with_level(CrisisLevel::Critical, 1.7);
        assert_eq!(r.confidence_score, 1.0);
        let r = CrisisResult::new("m", "u", "c").with_level(CrisisLevel::None, -0.2);
        assert_eq!(r.confidence_score, 0.0);
        assert!(!r.needs_response);
    }
}
