//! Engine configuration loaded from `config/triage.toml`.
//!
//! Every section is optional; missing values fall back to the documented
//! safe defaults, and a missing or malformed file yields the full default
//! config with a warning. Path and timing knobs can be overridden via env.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::fusion::FusionParams;
use crate::review::ReviewPolicy;
use crate::signals::remote::RemoteSignalCfg;
use crate::thresholds::{ThresholdSet, ThresholdTable};

// --- env defaults & names ---
pub const DEFAULT_CONFIG_PATH: &str = "config/triage.toml";

pub const ENV_CONFIG_PATH: &str = "TRIAGE_CONFIG_PATH";
pub const ENV_ENSEMBLE_MODE: &str = "TRIAGE_ENSEMBLE_MODE";
pub const ENV_ANALYSIS_TIMEOUT_MS: &str = "TRIAGE_ANALYSIS_TIMEOUT_MS";
pub const ENV_MODEL_TIMEOUT_MS: &str = "TRIAGE_MODEL_TIMEOUT_MS";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisCfg {
    /// Which per-mode threshold table is active.
    pub ensemble_mode: String,
    /// Overall coordination budget per message.
    pub analysis_timeout_ms: u64,
    /// Budget for each individual classification signal.
    pub model_timeout_ms: u64,
}

impl Default for AnalysisCfg {
    fn default() -> Self {
        Self {
            ensemble_mode: "majority".to_string(),
            analysis_timeout_ms: 3000,
            model_timeout_ms: 1500,
        }
    }
}

/// Full engine configuration. TOML sections map 1:1 onto fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub analysis: AnalysisCfg,
    pub fusion: FusionParams,
    pub review: ReviewPolicy,
    /// Per-signal fusion weights; absent signals weigh 1.0.
    pub signal_weights: HashMap<String, f64>,
    pub remote_signal: RemoteSignalCfg,
    /// Per-mode threshold sets, validated into a `ThresholdTable`.
    pub thresholds: HashMap<String, ThresholdSet>,
}

impl TriageConfig {
    /// Parse from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let cfg: TriageConfig = toml::from_str(toml_str)?;
        Ok(cfg)
    }

    /// Load from `TRIAGE_CONFIG_PATH` (or the default path), then apply env
    /// overrides. Any failure degrades to defaults rather than aborting.
    pub fn from_env() -> Self {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut cfg = match fs::read_to_string(&path) {
            Ok(s) => match Self::from_toml_str(&s) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!(target: "config", path = %path.display(), error = %e, "invalid triage config; using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };

        if let Ok(mode) = std::env::var(ENV_ENSEMBLE_MODE) {
            if !mode.trim().is_empty() {
                cfg.analysis.ensemble_mode = mode.trim().to_string();
            }
        }
        if let Some(ms) = parse_ms_env(ENV_ANALYSIS_TIMEOUT_MS) {
            cfg.analysis.analysis_timeout_ms = ms;
        }
        if let Some(ms) = parse_ms_env(ENV_MODEL_TIMEOUT_MS) {
            cfg.analysis.model_timeout_ms = ms;
        }

        cfg
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_millis(self.analysis.analysis_timeout_ms)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_millis(self.analysis.model_timeout_ms)
    }

    /// Validated threshold table built from the configured sets.
    pub fn threshold_table(&self) -> ThresholdTable {
        ThresholdTable::from_modes(self.thresholds.clone())
    }
}

/// Parse a positive integer millisecond value from env.
fn parse_ms_env(name: &str) -> Option<u64> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|&ms| ms > 0)
}
