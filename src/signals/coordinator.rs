//! Concurrent signal fan-out under per-signal and overall deadlines.
//!
//! Every registered signal runs in its own Tokio task bounded by
//! `per_signal_timeout`; a slow or failing signal degrades to an errored
//! `SignalResult` and never aborts the others. The collect phase is bounded
//! by `overall_timeout`: when it fires, still-running tasks are aborted and
//! whatever completed is returned with the `overall_timeout` marker set.

use std::collections::HashMap;
use std::time::Duration;

use metrics::counter;
use tokio::sync::mpsc;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::warn;

use super::{SignalRegistry, SignalResult};

/// Everything the coordinator hands to the orchestrator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinatorOutput {
    pub results: HashMap<String, SignalResult>,
    /// True when `overall_timeout` fired before every signal settled.
    pub overall_timeout: bool,
}

/// Run all registered signals against `message`. Results arrive in any
/// order; no signal can observe or affect another's result.
pub async fn run(
    message: &str,
    registry: &SignalRegistry,
    per_signal_timeout: Duration,
    overall_timeout: Duration,
) -> CoordinatorOutput {
    let n = registry.len();
    if n == 0 {
        return CoordinatorOutput::default();
    }

    let deadline = Instant::now() + overall_timeout;
    let (tx, mut rx) = mpsc::channel::<SignalResult>(n);

    let mut tasks = Vec::with_capacity(n);
    for signal in registry.signals() {
        let signal = signal.clone();
        let text = message.to_string();
        let tx = tx.clone();
        tasks.push(tokio::spawn(async move {
            let name = signal.name();
            let result = match timeout(per_signal_timeout, signal.evaluate(&text)).await {
                Ok(Ok(score)) => SignalResult::ok(name, score),
                Ok(Err(e)) => {
                    warn!(target: "signals", signal = name, error = %e, "signal failed");
                    counter!("triage_signal_errors_total").increment(1);
                    SignalResult::failed(name, e.to_string())
                }
                Err(_) => {
                    warn!(target: "signals", signal = name, "signal timed out");
                    counter!("triage_signal_timeouts_total").increment(1);
                    SignalResult::timed_out(name)
                }
            };
            // Receiver may already be gone after an overall timeout.
            let _ = tx.send(result).await;
        }));
    }
    drop(tx);

    let mut results = HashMap::with_capacity(n);
    let mut overall_hit = false;
    loop {
        match timeout_at(deadline, rx.recv()).await {
            Ok(Some(res)) => {
                results.insert(res.name.clone(), res);
            }
            Ok(None) => break, // all tasks settled
            Err(_) => {
                // Overall deadline: abort stragglers, keep what we have.
                overall_hit = true;
                for t in &tasks {
                    t.abort();
                }
                counter!("triage_overall_timeouts_total").increment(1);
                break;
            }
        }
    }

    CoordinatorOutput {
        results,
        overall_timeout: overall_hit,
    }
}
