//! Staff-review policy: when must a human look at the message.
//!
//! Ordered OR rules — any true rule forces review. Policy cut-offs are
//! simple named constants, tunable from config without recompilation.

use serde::Deserialize;

use crate::level::CrisisLevel;
use crate::patterns::SafetyFlags;
use crate::signals::SignalResult;
use crate::thresholds::ThresholdSet;

/// Tunable review cut-offs. Defaults match the production policy.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ReviewPolicy {
    /// Rule 1 can be disabled explicitly; everything else always applies.
    pub always_review_high_and_critical: bool,
    /// Rule 4: medium verdicts below this confidence get a human.
    pub medium_confidence_threshold: f64,
    /// Rule 5: low verdicts below this confidence get a human.
    pub low_confidence_threshold: f64,
    /// Rule 6: medium scores within this margin of the high cut point.
    pub boundary_margin: f64,
    /// Rule 7: a "none" verdict at or above this score is contradictory.
    pub contradiction_floor: f64,
    /// Max spread between healthy signal scores before they count as
    /// disagreeing (rule 2).
    pub disagreement_spread: f64,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self {
            always_review_high_and_critical: true,
            medium_confidence_threshold: 0.45,
            low_confidence_threshold: 0.75,
            boundary_margin: 0.05,
            contradiction_floor: 0.9,
            disagreement_spread: 0.4,
        }
    }
}

impl ReviewPolicy {
    fn is_sane(&self) -> bool {
        [
            self.medium_confidence_threshold,
            self.low_confidence_threshold,
            self.boundary_margin,
            self.contradiction_floor,
            self.disagreement_spread,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// True when healthy signals spread further apart than the policy allows.
/// Errored signals are excluded; fewer than two healthy signals cannot
/// disagree.
pub fn signals_disagree<'a, I>(results: I, policy: &ReviewPolicy) -> bool
where
    I: IntoIterator<Item = &'a SignalResult>,
{
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut healthy = 0usize;
    for r in results {
        if !r.is_ok() {
            continue;
        }
        healthy += 1;
        min = min.min(r.score);
        max = max.max(r.score);
    }
    healthy >= 2 && (max - min) > policy.disagreement_spread
}

/// Decide whether a human must review. Rules are evaluated as an OR chain;
/// order only matters for readability. An insane policy or non-finite score
/// falls back to the conservative default.
pub fn requires_review(
    level: CrisisLevel,
    score: f64,
    flags: &SafetyFlags,
    signal_disagreement: bool,
    policy: &ReviewPolicy,
    thresholds: &ThresholdSet,
) -> bool {
    if !policy.is_sane() || !score.is_finite() {
        return conservative_fallback(level);
    }

    // 1) High and critical always reach a human (unless configured off).
    if policy.always_review_high_and_critical
        && matches!(level, CrisisLevel::High | CrisisLevel::Critical)
    {
        return true;
    }

    // 2) Signals disagreeing beyond the configured spread.
    if signal_disagreement {
        return true;
    }

    // 3) Any pattern rule demanded escalation.
    if !flags.auto_escalation_required.is_empty() {
        return true;
    }

    // 4) Low-confidence medium.
    if level == CrisisLevel::Medium && score < policy.medium_confidence_threshold {
        return true;
    }

    // 5) Low-confidence low.
    if level == CrisisLevel::Low && score < policy.low_confidence_threshold {
        return true;
    }

    // 6) Near-boundary safety net: medium score close to the high cut point.
    if level == CrisisLevel::Medium && (thresholds.high - score).abs() <= policy.boundary_margin {
        return true;
    }

    // 7) False-negative safety net: a very confident "none" is suspicious.
    if level == CrisisLevel::None && score >= policy.contradiction_floor {
        return true;
    }

    false
}

/// Conservative fallback when the policy itself cannot be evaluated.
fn conservative_fallback(level: CrisisLevel) -> bool {
    matches!(level, CrisisLevel::High | CrisisLevel::Medium | CrisisLevel::Critical)
}
