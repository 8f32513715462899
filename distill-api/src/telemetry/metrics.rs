//! Prometheus Metrics Definitions
//!
//! Defines the DISTILL metrics and exposes a /metrics endpoint for
//! Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Agent runs take seconds to many minutes.
const AGENT_LATENCY_BUCKETS: &[f64] = &[1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0];

/// Global metrics instance - initialized once on first use
pub static METRICS: Lazy<ApiResult<DistillMetrics>> = Lazy::new(DistillMetrics::new);

/// Registered metrics, or `None` if registration failed.
pub fn metrics() -> Option<&'static DistillMetrics> {
    METRICS.as_ref().ok()
}

/// Container for all DISTILL metrics.
#[derive(Clone)]
pub struct DistillMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Agent invocation counter - labels: outcome (success/init_failed/failed)
    pub agent_invocations_total: CounterVec,

    /// Agent run duration histogram - labels: outcome
    pub agent_invocation_duration_seconds: HistogramVec,

    /// Trace fetch counter - labels: outcome (found/not_found/error/disabled)
    pub trace_fetches_total: CounterVec,

    /// Persisted record counter - labels: kind (raw/refined), status
    pub transcripts_written_total: CounterVec,
}

impl DistillMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        let register_failed =
            |name: &str, e: prometheus::Error| ApiError::internal_error(format!("Failed to register {}: {}", name, e));

        Ok(Self {
            http_requests_total: register_counter_vec!(
                "distill_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| register_failed("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "distill_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| register_failed("http_request_duration_seconds", e))?,

            agent_invocations_total: register_counter_vec!(
                "distill_agent_invocations_total",
                "Total reasoning agent invocations",
                &["outcome"]
            )
            .map_err(|e| register_failed("agent_invocations_total", e))?,

            agent_invocation_duration_seconds: register_histogram_vec!(
                "distill_agent_invocation_duration_seconds",
                "Reasoning agent run duration in seconds",
                &["outcome"],
                AGENT_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| register_failed("agent_invocation_duration_seconds", e))?,

            trace_fetches_total: register_counter_vec!(
                "distill_trace_fetches_total",
                "Trace document fetches from the tracing service",
                &["outcome"]
            )
            .map_err(|e| register_failed("trace_fetches_total", e))?,

            transcripts_written_total: register_counter_vec!(
                "distill_transcripts_written_total",
                "Raw and refined records persisted",
                &["kind", "status"]
            )
            .map_err(|e| register_failed("transcripts_written_total", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record one agent invocation.
    pub fn record_agent_invocation(&self, outcome: &str, duration_secs: f64) {
        self.agent_invocations_total
            .with_label_values(&[outcome])
            .inc();
        self.agent_invocation_duration_seconds
            .with_label_values(&[outcome])
            .observe(duration_secs);
    }

    /// Record the result of a settled trace fetch.
    pub fn record_trace_fetch(&self, outcome: &str) {
        self.trace_fetches_total.with_label_values(&[outcome]).inc();
    }

    /// Record a persisted record.
    pub fn record_transcript_write(&self, kind: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.transcripts_written_total
            .with_label_values(&[kind, status])
            .inc();
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
))]
pub async fn metrics_handler() -> impl IntoResponse {
    // Make sure the DISTILL families exist even before the first request.
    let _ = metrics();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
