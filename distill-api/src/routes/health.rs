//! Health Check Endpoints
//!
//! Provides Kubernetes-compatible health check endpoints:
//! - /health/ping - Simple liveness check
//! - /health/live - Process alive check
//! - /health/ready - Agent initialization state
//!
//! Readiness never triggers an agent connection; it reports what the last
//! attempt left behind.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::agent::{AgentHandle, AgentStatus};
use crate::state::{AppState, TraceBackend};

// ============================================================================
// TYPES
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthDetails {
    pub agent: ComponentHealth,
    pub tracing: ComponentHealth,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<AgentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping - Simple pong response
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/ping",
    tag = "Health",
    responses(
        (status = 200, description = "Service is responding", body = String),
    ),
))]
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live - Process liveness check
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse),
    ),
))]
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready - Readiness check (agent state)
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Agent is ready", body = HealthResponse),
        (status = 503, description = "Agent is not ready", body = HealthResponse),
    ),
))]
pub async fn readiness(
    State(agent): State<Arc<AgentHandle>>,
    State(start_time): State<Instant>,
    State(traces): State<Option<TraceBackend>>,
) -> impl IntoResponse {
    let agent_status = agent.status().await;
    let agent_health = agent_component(agent_status);

    let tracing_health = if traces.is_some() {
        ComponentHealth {
            status: HealthStatus::Healthy,
            state: None,
            error: None,
        }
    } else {
        ComponentHealth {
            status: HealthStatus::Degraded,
            state: None,
            error: Some("Tracing service credentials not configured".to_string()),
        }
    };

    let overall_status = match (agent_health.status, tracing_health.status) {
        (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
        (HealthStatus::Healthy, _) => HealthStatus::Degraded,
        (status, _) => status,
    };

    let response = HealthResponse {
        status: overall_status,
        message: None,
        details: Some(HealthDetails {
            agent: agent_health,
            tracing: tracing_health,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: start_time.elapsed().as_secs(),
        }),
    };

    let status_code = match overall_status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

fn agent_component(status: AgentStatus) -> ComponentHealth {
    match status {
        AgentStatus::Ready => ComponentHealth {
            status: HealthStatus::Healthy,
            state: Some(AgentStatus::Ready),
            error: None,
        },
        AgentStatus::Uninitialized => ComponentHealth {
            status: HealthStatus::Unhealthy,
            state: Some(AgentStatus::Uninitialized),
            error: None,
        },
        AgentStatus::Failed { reason } => ComponentHealth {
            status: HealthStatus::Unhealthy,
            state: Some(AgentStatus::Failed {
                reason: reason.clone(),
            }),
            error: Some(reason),
        },
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}
