//! Prometheus metrics for session-service.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Histogram,
    HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

/// Recorder behind the `metrics` facade (HTTP middleware counters).
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Session operations by outcome (success, not_found, precondition_failed, ...).
pub static SESSION_OPERATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "session_operations_total",
        "Total number of session operations by outcome",
        &["operation", "outcome"]
    )
    .expect("Failed to register session_operations_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "session_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Time spent queued for the gateway's single admission slot.
pub static GATEWAY_WAIT_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "session_gateway_wait_seconds",
        "Time spent waiting for the store gateway in seconds",
        vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    )
    .expect("Failed to register gateway_wait_seconds")
});

/// Initialize all metrics and install the `metrics` recorder.
///
/// Only the first call installs the recorder; later calls are no-ops.
pub fn init_metrics() {
    Lazy::force(&SESSION_OPERATIONS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&GATEWAY_WAIT_SECONDS);

    if METRICS_HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => tracing::warn!("Prometheus recorder not installed: {}", e),
    }
}

pub fn record_operation(operation: &str, outcome: &str) {
    SESSION_OPERATIONS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    output.push_str(&encoder.encode_to_string(&metric_families).unwrap_or_default());
    output
}
