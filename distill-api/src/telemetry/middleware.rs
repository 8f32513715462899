//! Axum Middleware for HTTP Request Tracing and Metrics
//!
//! Wraps every request in a `tracing` span and records Prometheus request
//! metrics once the response is ready.

use axum::{extract::Request, middleware::Next, response::Response};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics::metrics;

/// 32-char hex trace ids, hyphenated UUIDs and numeric segments.
static ID_SEGMENT: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"/(?:[0-9a-fA-F]{32}|[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}|\d+)(/|$)",
    )
    .ok()
});

/// Normalize path for metrics/spans (replace ids with placeholders).
///
/// Keeps Prometheus label cardinality bounded. Static files under `/data`
/// collapse into a single route.
fn normalize_path(path: &str) -> String {
    if path == "/data" || path.starts_with("/data/") {
        return "/data/{file}".to_string();
    }
    match ID_SEGMENT.as_ref() {
        // Applied twice: adjacent id segments share the separating slash.
        Some(re) => {
            let once = re.replace_all(path, "/{id}$1");
            re.replace_all(&once, "/{id}$1").into_owned()
        }
        None => path.to_string(),
    }
}

/// Observability middleware for Axum.
///
/// 1. `http_request` span around the inner service
/// 2. Prometheus metrics recording
/// 3. Completion log line
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let normalized_path = normalize_path(&path);

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = %normalized_path,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status();

    if let Some(metrics) = metrics() {
        metrics.record_http_request(
            method.as_str(),
            &normalized_path,
            status.as_u16(),
            duration.as_secs_f64(),
        );
    }

    if status.is_server_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            "Request failed"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            "Request completed"
        );
    }

    response
}
