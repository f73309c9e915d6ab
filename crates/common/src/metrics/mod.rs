//! Metrics helpers
//!
//! Prometheus-style metric registration and recording with standardized
//! naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all ragrelay metrics
pub const METRICS_PREFIX: &str = "ragrelay";

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of proxied requests"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Retrieval latency in seconds"
    );

    describe_gauge!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of results returned from retrieval"
    );

    describe_counter!(
        format!("{}_chunks_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks created by ingestion"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding batch latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Record a proxied request
pub fn record_request(endpoint: &str, status: u16) {
    counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a retrieval call
pub fn record_retrieval(duration_secs: f64, result_count: usize) {
    histogram!(format!("{}_retrieval_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    gauge!(format!("{}_retrieval_results_count", METRICS_PREFIX)).set(result_count as f64);
}

/// Record chunks created by one ingestion run
pub fn record_chunks_created(count: usize) {
    counter!(format!("{}_chunks_created_total", METRICS_PREFIX)).increment(count as u64);
}

/// Record one embedding batch
pub fn record_embedding(duration_secs: f64, model: &str) {
    histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        "model" => model.to_string()
    )
    .record(duration_secs);
}
