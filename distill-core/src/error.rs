//! Error types for DISTILL operations

use thiserror::Error;

/// Reasoning agent errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("Agent not initialized: {reason}")]
    NotInitialized { reason: String },

    #[error("Agent {agent} failed to initialize: {reason}")]
    InitializationFailed { agent: String, reason: String },

    #[error("Agent {agent} failed while running: {reason}")]
    InvocationFailed { agent: String, reason: String },

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Tracing service errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TraceError {
    #[error("Tracing service credentials are not configured")]
    NotConfigured,

    #[error("Trace {trace_id} not found")]
    NotFound { trace_id: String },

    #[error("Tracing service request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Invalid trace document: {reason}")]
    InvalidDocument { reason: String },

    #[error("Failed to report trace {trace_id}: {reason}")]
    ReportFailed { trace_id: String, reason: String },
}

/// Transcript persistence errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Serialization failed for {what}: {reason}")]
    Serialization { what: String, reason: String },

    #[error("No {kind} record stored for trace {trace_id}")]
    NotFound { kind: String, trace_id: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all DISTILL errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DistillError {
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for DISTILL operations.
pub type DistillResult<T> = Result<T, DistillError>;

// =============================================================================
// TESTS
// =============================================================================
