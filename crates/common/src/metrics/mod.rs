//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming. Descriptions are
//! registered once at startup; the recorder itself is installed by the
//! binary (metrics-exporter-prometheus).

use crate::errors::Upstream;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metric names
pub mod names {
    pub const REQUESTS: &str = "paperlens_requests_total";
    pub const REQUEST_DURATION: &str = "paperlens_request_duration_seconds";
    pub const UPSTREAM_REQUESTS: &str = "paperlens_upstream_requests_total";
    pub const UPSTREAM_DURATION: &str = "paperlens_upstream_duration_seconds";
    pub const ANALYSES_GENERATED: &str = "paperlens_analyses_generated_total";
    pub const ANALYSES_REUSED: &str = "paperlens_analyses_reused_total";
    pub const EXPORT_ROWS: &str = "paperlens_export_rows_total";
    pub const STORAGE_ERRORS: &str = "paperlens_storage_errors_total";
}

/// Buckets for upstream latency (completion calls take seconds)
pub const UPSTREAM_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 60s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(names::REQUESTS, Unit::Count, "Total number of HTTP requests");
    describe_histogram!(
        names::REQUEST_DURATION,
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        names::UPSTREAM_REQUESTS,
        Unit::Count,
        "Calls to external APIs by service and outcome"
    );
    describe_histogram!(
        names::UPSTREAM_DURATION,
        Unit::Seconds,
        "External API latency in seconds"
    );

    describe_counter!(
        names::ANALYSES_GENERATED,
        Unit::Count,
        "Analyses produced by the completion API and stored"
    );
    describe_counter!(
        names::ANALYSES_REUSED,
        Unit::Count,
        "Analysis requests answered from storage"
    );
    describe_counter!(names::EXPORT_ROWS, Unit::Count, "Rows pushed to workspaces");
    describe_counter!(names::STORAGE_ERRORS, Unit::Count, "Failed storage operations");

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
            names::REQUESTS,
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            names::REQUEST_DURATION,
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Times one call to an external API
pub struct UpstreamTimer {
    start: Instant,
    service: Upstream,
}

impl UpstreamTimer {
    pub fn start(service: Upstream) -> Self {
        Self {
            start: Instant::now(),
            service,
        }
    }

    pub fn finish(self, success: bool) {
        let outcome = if success { "success" } else { "error" };

        counter!(
            names::UPSTREAM_REQUESTS,
            "service" => self.service.as_str(),
            "outcome" => outcome
        )
        .increment(1);

        histogram!(names::UPSTREAM_DURATION, "service" => self.service.as_str())
            .record(self.start.elapsed().as_secs_f64());
    }
}

/// Record how an analyze-and-save request was answered
pub fn record_analysis(generated: bool) {
    if generated {
        counter!(names::ANALYSES_GENERATED).increment(1);
    } else {
        counter!(names::ANALYSES_REUSED).increment(1);
    }
}

/// Record one exported workspace row
pub fn record_export_row() {
    counter!(names::EXPORT_ROWS).increment(1);
}
