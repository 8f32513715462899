//! HTTP provider implementations
//!
//! Concrete implementations of the agent and tracing-service traits.

pub mod agent;
pub mod langfuse;

pub use agent::{AgentClient, HttpAgentFactory, HttpAgentProvider};
pub use langfuse::{LangfuseClient, LangfuseCredentials};

use distill_core::{AgentError, DistillError};

pub(crate) fn request_failed(
    provider: &str,
    status: u16,
    message: impl Into<String>,
) -> DistillError {
    AgentError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    }
    .into()
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> DistillError {
    AgentError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    }
    .into()
}

/// Trimmed base URL, so `format!("{}/path")` never yields a double slash.
pub(crate) fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
