//! Score fusion: signals + pattern boost + context boost -> one [0,1] score.
//!
//! The combination is a weighted mean plus additive boosts, so it is
//! insensitive to signal arrival order. All-error signal sets still produce
//! a valid score driven by the boosts alone.

use std::collections::HashMap;

use serde::Deserialize;

use crate::context::ContextSignals;
use crate::result::clamp01;
use crate::signals::SignalResult;

/// Policy constants for fusion. Defaults mirror the tuned production values;
/// every field is overridable from `config/triage.toml`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FusionParams {
    /// Per-match pattern boost.
    pub pattern_boost_per_match: f64,
    /// Cap on the total pattern boost.
    pub pattern_boost_cap: f64,
    pub isolation_boost: f64,
    pub hopelessness_boost: f64,
    pub temporal_boost: f64,
    /// Subtracted once when negation is detected and a signal flagged a
    /// flip candidate, so negated language is not double-counted.
    pub negation_discount: f64,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            pattern_boost_per_match: 0.05,
            pattern_boost_cap: 0.25,
            isolation_boost: 0.05,
            hopelessness_boost: 0.08,
            temporal_boost: 0.03,
            negation_discount: 0.05,
        }
    }
}

/// Fuse signal scores, pattern evidence, and context boosts into one bounded
/// crisis score. `signal_weights` maps signal name -> weight; absent names
/// default to 1.0 (the equal-weighting baseline).
pub fn fuse(
    signals: &HashMap<String, SignalResult>,
    // Pattern aggregate confidence feeds the emergency rollup and review
    // policy; fusion keys off the match count only.
    _pattern_confidence: f64,
    pattern_match_count: usize,
    context: &ContextSignals,
    params: &FusionParams,
    signal_weights: &HashMap<String, f64>,
) -> f64 {
    // 1) Weighted mean over non-error signals. Errored signals contribute
    //    neither score nor weight.
    let mut num = 0.0;
    let mut denom = 0.0;
    let mut flip_candidate = false;
    for res in signals.values() {
        if !res.is_ok() {
            continue;
        }
        let w = signal_weights.get(&res.name).copied().unwrap_or(1.0).max(0.0);
        num += res.score * w;
        denom += w;
        flip_candidate |= res.flip_candidate;
    }
    let base = if denom > 0.0 { num / denom } else { 0.0 };

    // 2) Pattern boost, capped.
    let pattern_boost = (pattern_match_count as f64 * params.pattern_boost_per_match)
        .min(params.pattern_boost_cap);

    // 3) Context boost from lexical indicators.
    let context_boost = context.isolation_indicator_count as f64 * params.isolation_boost
        + context.hopelessness_indicator_count as f64 * params.hopelessness_boost
        + context.temporal_indicators.len() as f64 * params.temporal_boost;

    // 4) Negation discount, applied once.
    let discount = if context.negation_detected && flip_candidate {
        params.negation_discount
    } else {
        0.0
    };

    clamp01(base + pattern_boost + context_boost - discount)
}
