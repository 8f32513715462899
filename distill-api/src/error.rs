//! Error Types for DISTILL API
//!
//! This module defines error handling for the HTTP layer:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use distill_core::{AgentError, DistillError, StorageError, TraceError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// No stored record for the requested trace
    RecordNotFound,

    // ========================================================================
    // Upstream Errors (500, 502, 503)
    // ========================================================================
    /// The reasoning agent could not be initialized
    AgentUnavailable,

    /// The reasoning agent failed while answering
    AgentFailed,

    /// The tracing service could not be reached or rejected the request
    TraceUnavailable,

    // ========================================================================
    // Server Errors (500, 503, 504)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Transcript persistence failed
    StorageError,

    /// Service is temporarily unavailable
    ServiceUnavailable,

    /// Operation timed out
    Timeout,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput | ErrorCode::MissingField => StatusCode::BAD_REQUEST,

            ErrorCode::RecordNotFound => StatusCode::NOT_FOUND,

            ErrorCode::AgentUnavailable | ErrorCode::ServiceUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            ErrorCode::TraceUnavailable => StatusCode::BAD_GATEWAY,

            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,

            ErrorCode::AgentFailed | ErrorCode::InternalError | ErrorCode::StorageError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::RecordNotFound => "Record not found",
            ErrorCode::AgentUnavailable => "Agent not initialized",
            ErrorCode::AgentFailed => "Agent execution failed",
            ErrorCode::TraceUnavailable => "Tracing service unavailable",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::StorageError => "Transcript storage failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::Timeout => "Operation timed out",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn record_not_found(kind: &str, trace_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::RecordNotFound,
            format!("No {} record for trace {}", kind, trace_id),
        )
    }

    pub fn agent_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AgentUnavailable, message)
    }

    pub fn agent_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AgentFailed, message)
    }

    pub fn trace_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TraceUnavailable, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn storage_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn timeout(operation: &str) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Operation '{}' timed out", operation),
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Lets handlers return `Result<Json<T>, ApiError>` directly.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<DistillError> for ApiError {
    fn from(err: DistillError) -> Self {
        match err {
            DistillError::Agent(
                e @ (AgentError::NotInitialized { .. } | AgentError::InitializationFailed { .. }),
            ) => ApiError::agent_unavailable(e.to_string()),
            DistillError::Agent(e) => ApiError::agent_failed(e.to_string()),
            DistillError::Trace(TraceError::NotFound { trace_id }) => {
                ApiError::record_not_found("trace", trace_id)
            }
            DistillError::Trace(e) => {
                tracing::warn!(error = %e, "Tracing service error");
                ApiError::trace_unavailable(e.to_string())
            }
            DistillError::Storage(StorageError::NotFound { kind, trace_id }) => {
                ApiError::record_not_found(&kind, trace_id)
            }
            DistillError::Storage(e) => {
                tracing::error!(error = %e, "Storage error");
                ApiError::storage_error(e.to_string())
            }
            DistillError::Config(e) => ApiError::internal_error(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use distill_core::ConfigError;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::RecordNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::AgentUnavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ErrorCode::AgentFailed.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorCode::TraceUnavailable.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorCode::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_distill_error_conversion() {
        let err: ApiError = DistillError::from(AgentError::InitializationFailed {
            agent: "biomni-a1".to_string(),
            reason: "connection refused".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::AgentUnavailable);
        assert!(err.message.contains("connection refused"));

        let err: ApiError = DistillError::from(AgentError::InvocationFailed {
            agent: "biomni-a1".to_string(),
            reason: "tool crashed".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::AgentFailed);

        let err: ApiError = DistillError::from(StorageError::NotFound {
            kind: "raw".to_string(),
            trace_id: "abc".to_string(),
        })
        .into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.message.contains("abc"));

        let err: ApiError = DistillError::from(ConfigError::MissingRequired {
            field: "LANGFUSE_HOST".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::InternalError);
    }

    #[test]
    fn test_api_error_with_details() {
        let details = serde_json::json!({"field": "message"});
        let err = ApiError::invalid_input("message must not be empty").with_details(details.clone());
        assert_eq!(err.details, Some(details));
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::agent_unavailable("Agent not initialized");
        let json = serde_json::to_string(&err)?;
        assert!(json.contains("AGENT_UNAVAILABLE"));
        assert!(!json.contains("details"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::from_code(ErrorCode::StorageError);
        assert_eq!(err.to_string(), "StorageError: Transcript storage failed");
    }
}
