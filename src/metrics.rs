use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder and expose static config gauges.
    /// Counters (`triage_analyses_total`, `triage_signal_timeouts_total`,
    /// `triage_overall_timeouts_total`) are emitted from the pipeline and
    /// coordinator.
    pub fn init(analysis_timeout_ms: u64, model_timeout_ms: u64) -> Self {
        let builder = PrometheusBuilder::new();

        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");

        gauge!("triage_analysis_timeout_ms").set(analysis_timeout_ms as f64);
        gauge!("triage_model_timeout_ms").set(model_timeout_ms as f64);

        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
