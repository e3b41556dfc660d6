//! Per-mode threshold tables and score -> level mapping.
//!
//! Every loaded set is validated for the monotonic invariant
//! `low <= medium <= high <= critical`; a violating set is never used —
//! it is logged and replaced by the hard-coded safe default. Unknown mode
//! names fall back to the same default.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::warn;

use crate::level::CrisisLevel;

/// Ordered cut points in [0, 1] for one ensemble mode.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ThresholdSet {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for ThresholdSet {
    /// Hard-coded safe default used whenever a configured set is missing
    /// or invalid.
    fn default() -> Self {
        Self {
            low: 0.2,
            medium: 0.4,
            high: 0.6,
            critical: 0.8,
        }
    }
}

impl ThresholdSet {
    pub fn is_monotonic(&self) -> bool {
        self.low <= self.medium && self.medium <= self.high && self.high <= self.critical
    }

    fn in_unit_range(&self) -> bool {
        [self.low, self.medium, self.high, self.critical]
            .iter()
            .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
    }
}

/// Map a fused score to a discrete level. Comparisons are inclusive at each
/// cut point, checked from most to least severe.
pub fn map_to_level(score: f64, thresholds: &ThresholdSet) -> CrisisLevel {
    if score >= thresholds.critical {
        CrisisLevel::Critical
    } else if score >= thresholds.high {
        CrisisLevel::High
    } else if score >= thresholds.medium {
        CrisisLevel::Medium
    } else if score >= thresholds.low {
        CrisisLevel::Low
    } else {
        CrisisLevel::None
    }
}

/// Validated, read-only collection of per-mode threshold sets.
#[derive(Debug, Clone)]
pub struct ThresholdTable {
    modes: HashMap<String, ThresholdSet>,
}

impl ThresholdTable {
    /// Build from configured sets, validating each at load. A set that is
    /// non-monotonic or outside [0,1] is replaced by the safe default.
    pub fn from_modes(configured: HashMap<String, ThresholdSet>) -> Self {
        let mut modes = Self::default_seed();
        for (mode, set) in configured {
            if set.is_monotonic() && set.in_unit_range() {
                modes.insert(mode, set);
            } else {
                warn!(
                    target: "thresholds",
                    %mode,
                    ?set,
                    "threshold set violates ordering invariant; using safe default"
                );
                modes.insert(mode, ThresholdSet::default());
            }
        }
        Self { modes }
    }

    /// Built-in per-mode seeds. "consensus" requires more evidence to
    /// escalate; "weighted" escalates earlier.
    fn default_seed() -> HashMap<String, ThresholdSet> {
        let mut m = HashMap::new();
        m.insert(
            "consensus".to_string(),
            ThresholdSet {
                low: 0.25,
                medium: 0.45,
                high: 0.65,
                critical: 0.85,
            },
        );
        m.insert("majority".to_string(), ThresholdSet::default());
        m.insert(
            "weighted".to_string(),
            ThresholdSet {
                low: 0.15,
                medium: 0.35,
                high: 0.55,
                critical: 0.75,
            },
        );
        m
    }

    /// Threshold set for a mode name; unknown modes fall back to the safe
    /// default, never to an undefined table.
    pub fn set_for(&self, mode: &str) -> ThresholdSet {
        match self.modes.get(mode) {
            Some(set) => *set,
            None => {
                warn!(target: "thresholds", %mode, "unknown ensemble mode; using safe default");
                ThresholdSet::default()
            }
        }
    }

    pub fn modes(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.modes.keys().map(String::as_str).collect();
        v.sort();
        v
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            modes: Self::default_seed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_is_inclusive_at_cut_points() {
        let t = ThresholdSet::default(); // 0.2 / 0.4 / 0.6 / 0.8
        assert_eq!(map_to_level(0.0, &t), CrisisLevel::None);
        assert_eq!(map_to_level(0.19, &t), CrisisLevel::None);
        assert_eq!(map_to_level(0.2, &t), CrisisLevel::Low);
        assert_eq!(map_to_level(0.4, &t), CrisisLevel::Medium);
        assert_eq!(map_to_level(0.6, &t), CrisisLevel::High);
        assert_eq!(map_to_level(0.8, &t), CrisisLevel::Critical);
        assert_eq!(map_to_level(1.0, &t), CrisisLevel::Critical);
    }

    #[test]
    fn non_monotonic_set_is_replaced_at_load() {
        let mut cfg = HashMap::new();
        cfg.insert(
            "consensus".to_string(),
            ThresholdSet {
                low: 0.5,
                medium: 0.3, // violates low <= medium
                high: 0.6,
                critical: 0.8,
            },
        );
        let table = ThresholdTable::from_modes(cfg);
        assert_eq!(table.set_for("consensus"), ThresholdSet::default());
    }

    #[test]
    fn out_of_range_set_is_replaced_at_load() {
        let mut cfg = HashMap::new();
        cfg.insert(
            "weighted".to_string(),
            ThresholdSet {
                low: 0.1,
                medium: 0.2,
                high: 0.3,
                critical: 1.5,
            },
        );
        let table = ThresholdTable::from_modes(cfg);
        assert_eq!(table.set_for("weighted"), ThresholdSet::default());
    }

    #[test]
    fn unknown_mode_falls_back_to_default() {
        let table = ThresholdTable::default();
        assert_eq!(table.set_for("does-not-exist"), ThresholdSet::default());
    }

    #[test]
    fn seeded_modes_are_monotonic() {
        let table = ThresholdTable::default();
        for mode in table.modes() {
            assert!(table.set_for(mode).is_monotonic(), "mode {mode}");
        }
    }

    #[test]
    fn configured_valid_set_is_kept_as_is() {
        let mut cfg = HashMap::new();
        let set = ThresholdSet {
            low: 0.1,
            medium: 0.25,
            high: 0.45,
            critical: 0.9,
        };
        cfg.insert("majority".to_string(), set);
        let table = ThresholdTable::from_modes(cfg);
        // No adjustment factor is applied: configured thresholds are used verbatim.
        assert_eq!(table.set_for("majority"), set);
    }
}
