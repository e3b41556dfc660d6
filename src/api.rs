//! HTTP surface: health probe, analyze endpoint, debug/admin routes.
//!
//! Thin layer over `TriageEngine`; all triage logic lives in the pipeline.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::pipeline::{AnalysisRequest, TriageEngine};
use crate::result::CrisisResult;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TriageEngine>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/analyze", post(analyze))
        .route("/debug/thresholds", get(debug_thresholds))
        .route("/admin/reload-patterns", post(admin_reload_patterns))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalysisRequest>,
) -> Json<CrisisResult> {
    Json(state.engine.analyze(&req).await)
}

#[derive(Serialize)]
struct ThresholdsOut {
    active_mode: String,
    modes: Vec<String>,
    low: f64,
    medium: f64,
    high: f64,
    critical: f64,
}

async fn debug_thresholds(State(state): State<AppState>) -> Json<ThresholdsOut> {
    let mode = state.engine.config().analysis.ensemble_mode.clone();
    let set = state.engine.thresholds().set_for(&mode);
    Json(ThresholdsOut {
        active_mode: mode,
        modes: state
            .engine
            .thresholds()
            .modes()
            .into_iter()
            .map(str::to_string)
            .collect(),
        low: set.low,
        medium: set.medium,
        high: set.high,
        critical: set.critical,
    })
}

async fn admin_reload_patterns(State(state): State<AppState>) -> String {
    let rules = state.engine.patterns().reload_from_env();
    metrics::counter!("triage_pattern_reloads_total").increment(1);
    format!("reloaded: {rules} rules")
}
