//! Prometheus metrics

use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the global recorder; later calls return the same handle
pub fn init_metrics() -> Option<PrometheusHandle> {
    PROMETHEUS
        .get_or_try_init(|| PrometheusBuilder::new().install_recorder())
        .map(Clone::clone)
        .map_err(|e| tracing::warn!(error = %e, "Failed to install metrics recorder"))
        .ok()
}

/// `GET /metrics`
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}

pub fn record_request(route: &'static str) {
    metrics::counter!("vocab_http_requests_total", "route" => route).increment(1);
}

pub fn record_extraction(method: &'static str, processed_chunks: usize) {
    metrics::counter!("vocab_extractions_total", "method" => method).increment(1);
    metrics::counter!("vocab_extraction_chunks_processed").increment(processed_chunks as u64);
}

pub fn record_audio_file(status: &'static str) {
    metrics::counter!("vocab_audio_files_total", "status" => status).increment(1);
}
