// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod context;
pub mod fusion;
pub mod level;
pub mod metrics;
pub mod patterns;
pub mod pipeline;
pub mod result;
pub mod review;
pub mod signals;
pub mod thresholds;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::level::CrisisLevel;
pub use crate::pipeline::{AnalysisRequest, TriageEngine};
pub use crate::result::{AnalysisStatus, CrisisResult};

use crate::config::TriageConfig;
use crate::patterns::{PatternHandle, PatternStore};
use crate::signals::remote;

/// Build a fully wired engine from env/config files: triage config, seeded
/// or file-backed pattern store, and the startup signal set.
pub fn build_engine() -> TriageEngine {
    let config = TriageConfig::from_env();
    let patterns = PatternHandle::new(PatternStore::from_env());
    let registry = remote::build_registry(&config.remote_signal);
    TriageEngine::new(config, patterns, registry)
}
