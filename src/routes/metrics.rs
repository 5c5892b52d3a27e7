//! Prometheus metrics endpoint
//!
//! Exposes gateway metrics in Prometheus format for monitoring.

use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;

/// Global Prometheus handle for metrics export
static PROMETHEUS_HANDLE: Lazy<PrometheusHandle> = Lazy::new(|| {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
});

/// Initialize metrics (call once at startup)
pub fn init_metrics() {
    // Force initialization of the lazy static
    let _ = &*PROMETHEUS_HANDLE;

    register_metrics();
}

fn register_metrics() {
    metrics::describe_counter!(
        "gateway_requests_total",
        "Total number of chat completion requests handled"
    );
    metrics::describe_histogram!(
        "gateway_request_duration_seconds",
        "Time until the response head was ready, in seconds"
    );
    metrics::describe_counter!(
        "gateway_tokens_total",
        "Prompt and completion tokens reported by the upstream"
    );
    metrics::describe_counter!(
        "gateway_credential_refreshes_total",
        "Upstream credential refresh attempts"
    );
}

/// Prometheus metrics endpoint handler
pub async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE.render()
}

/// Record a chat completion request
pub fn record_request(status: &str, model: &str, stream: bool, duration_secs: f64) {
    metrics::counter!(
        "gateway_requests_total",
        "status" => status.to_string(),
        "model" => model.to_string(),
        "stream" => stream.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "model" => model.to_string())
        .record(duration_secs);
}

/// Record tokens reported by the upstream
pub fn record_tokens(token_type: &str, count: u64, model: &str) {
    metrics::counter!(
        "gateway_tokens_total",
        "type" => token_type.to_string(),
        "model" => model.to_string()
    )
    .increment(count);
}

/// Record a credential refresh attempt
pub fn record_credential_refresh(result: &str) {
    metrics::counter!("gateway_credential_refreshes_total", "result" => result.to_string())
        .increment(1);
}
