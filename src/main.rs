//! Crisis Triage Service — Binary Entrypoint
//! Boots the Axum HTTP server, wiring the engine, routes, and middleware.

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crisis_triage_engine::api::{create_router, AppState};
use crisis_triage_engine::build_engine;
use crisis_triage_engine::metrics::Metrics;
use crisis_triage_engine::patterns::{
    start_hot_reload_thread, DEFAULT_PATTERNS_CONFIG_PATH, ENV_PATTERNS_CONFIG_PATH,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,patterns=info,pipeline=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let engine = build_engine();

    let metrics = Metrics::init(
        engine.config().analysis.analysis_timeout_ms,
        engine.config().analysis.model_timeout_ms,
    );

    // If hot reload is enabled, spawn the background watcher on the
    // pattern file.
    let path = std::env::var(ENV_PATTERNS_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_PATTERNS_CONFIG_PATH));
    start_hot_reload_thread(engine.patterns().clone(), path);

    let state = AppState {
        engine: Arc::new(engine),
    };
    let router = create_router(state).merge(metrics.router());

    let addr = std::env::var("TRIAGE_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "crisis triage engine listening");
    axum::serve(listener, router).await?;

    Ok(())
}
