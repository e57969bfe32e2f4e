//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with latency-oriented histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all DraftForge metrics
pub const METRICS_PREFIX: &str = "draftforge";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for embedding and generation latency (typically slower)
pub const UPSTREAM_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    120.0,  // 2min
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Search metrics
    describe_counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of corpus searches"
    );

    describe_histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Corpus search latency in seconds"
    );

    describe_gauge!(
        format!("{}_search_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of documents returned from the last search"
    );

    describe_counter!(
        format!("{}_retrieval_fallbacks_total", METRICS_PREFIX),
        Unit::Count,
        "Degraded retrieval paths taken, by kind"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API errors"
    );

    // Template metrics
    describe_counter!(
        format!("{}_template_mutations_total", METRICS_PREFIX),
        Unit::Count,
        "Template state mutations, by operation"
    );

    // Notification metrics
    describe_counter!(
        format!("{}_notifications_published_total", METRICS_PREFIX),
        Unit::Count,
        "Messages published to section subscribers"
    );

    describe_gauge!(
        format!("{}_notification_subscribers", METRICS_PREFIX),
        Unit::Count,
        "Live section subscribers after the last publish"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total corpus documents ingested"
    );

    describe_counter!(
        format!("{}_chunks_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks created"
    );

    // Generation metrics
    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Section generation latency in seconds"
    );

    describe_counter!(
        format!("{}_generations_total", METRICS_PREFIX),
        Unit::Count,
        "Section generations, by outcome"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record search metrics
pub fn record_search(duration_secs: f64, document_count: usize, chunk_count: usize) {
    counter!(format!("{}_search_queries_total", METRICS_PREFIX)).increment(1);

    histogram!(format!("{}_search_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    gauge!(
        format!("{}_search_results_count", METRICS_PREFIX),
        "kind" => "documents"
    )
    .set(document_count as f64);

    gauge!(
        format!("{}_search_results_count", METRICS_PREFIX),
        "kind" => "chunks"
    )
    .set(chunk_count as f64);
}

/// Record a degraded retrieval path (filter fallback, ranking fallback, ...)
pub fn record_retrieval_fallback(kind: &'static str) {
    counter!(
        format!("{}_retrieval_fallbacks_total", METRICS_PREFIX),
        "kind" => kind
    )
    .increment(1);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string(),
            "batch" => if batch_size > 1 { "batch" } else { "single" }
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_embedding_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

/// Record a template state mutation
pub fn record_template_mutation(operation: &'static str) {
    counter!(
        format!("{}_template_mutations_total", METRICS_PREFIX),
        "operation" => operation
    )
    .increment(1);
}

/// Record a notifier publish and the surviving subscriber count
pub fn record_publish(delivered: usize) {
    counter!(format!("{}_notifications_published_total", METRICS_PREFIX)).increment(1);
    gauge!(format!("{}_notification_subscribers", METRICS_PREFIX)).set(delivered as f64);
}

/// Helper to record ingestion metrics
pub fn record_ingestion(chunks_created: usize) {
    counter!(format!("{}_documents_ingested_total", METRICS_PREFIX)).increment(1);
    counter!(format!("{}_chunks_created_total", METRICS_PREFIX)).increment(chunks_created as u64);
}

/// Record one section generation
pub fn record_generation(duration_secs: f64, success: bool) {
    let outcome = if success { "success" } else { "error" };

    counter!(
        format!("{}_generations_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(format!("{}_generation_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}
