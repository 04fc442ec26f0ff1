//! Prometheus metrics
//!
//! Components record through the `metrics` facade; this module installs
//! the Prometheus recorder and renders it at `/metrics`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;

/// Install the global recorder. Returns `None` when a recorder is already
/// installed (tests build several servers in one process).
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            describe();
            Some(handle)
        },
        Err(e) => {
            tracing::warn!(error = %e, "Metrics recorder not installed");
            None
        },
    }
}

fn describe() {
    metrics::describe_counter!("cc_turns_total", "Turns handled, by next action or error code");
    metrics::describe_histogram!("cc_turn_latency_ms", "End-to-end turn latency");
    metrics::describe_counter!("cc_escalations_total", "Escalations created, by reason and priority");
    metrics::describe_counter!("cc_nlu_requests_total", "NLU classification calls, by provider and outcome");
    metrics::describe_histogram!("cc_nlu_latency_ms", "NLU classification latency");
    metrics::describe_counter!("cc_notifications_dead_lettered_total", "Notifications that could not be delivered");
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}
