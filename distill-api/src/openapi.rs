//! OpenAPI Specification for DISTILL API
//!
//! Generated with utoipa from the route annotations and response types.

use utoipa::OpenApi;

use crate::agent::AgentStatus;
use crate::error::{ApiError, ErrorCode};
use crate::routes::chat::{ChatRequest, ChatResponse};
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::{chat, health, transcripts};
use crate::telemetry::metrics;

/// OpenAPI document for DISTILL API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "DISTILL API",
        description = "Reasoning agent chat endpoint that captures every run as a fine-tuning transcript",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8000", description = "Local Development")
    ),
    tags(
        (name = "Chat", description = "Agent invocation and dataset capture"),
        (name = "Transcripts", description = "Stored raw records and refined transcripts"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        chat::chat,
        transcripts::get_raw,
        transcripts::get_refined,
        health::ping,
        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(schemas(
        ChatRequest,
        ChatResponse,
        ApiError,
        ErrorCode,
        AgentStatus,
        HealthResponse,
        HealthStatus,
        HealthDetails,
        ComponentHealth,
    ))
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate the OpenAPI document as a JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
