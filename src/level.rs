//! Ordinal crisis-severity levels.
//!
//! Ordering matters: review policy and threshold mapping rely on
//! `none < low < medium < high < critical`.

use serde::{Deserialize, Serialize};

/// Severity classification for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrisisLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl CrisisLevel {
    /// Stable lowercase name used in config files and responses.
    pub fn as_str(self) -> &'static str {
        match self {
            CrisisLevel::None => "none",
            CrisisLevel::Low => "low",
            CrisisLevel::Medium => "medium",
            CrisisLevel::High => "high",
            CrisisLevel::Critical => "critical",
        }
    }

    /// A message at `low` or above deserves some automated response.
    pub fn needs_response(self) -> bool {
        self > CrisisLevel::None
    }
}

impl Default for CrisisLevel {
    fn default() -> Self {
        CrisisLevel::None
    }
}

impl std::fmt::Display for CrisisLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
