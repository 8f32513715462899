//! DISTILL API - HTTP Service
//!
//! Serves the chat endpoint that forwards messages to the reasoning agent
//! and turns every run into a fine-tuning sample: the agent's trace is
//! fetched from the tracing service, flattened and persisted next to the
//! raw inputs and outputs.

pub mod agent;
pub mod config;
pub mod error;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use agent::{AgentHandle, AgentStatus};
pub use config::{
    resolve_bind_addr, AgentConfig, ApiConfig, FlattenSettings, LangfuseConfig, StorageConfig,
};
pub use error::{ApiError, ApiResult, ErrorCode};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::chat::{ChatRequest, ChatResponse};
pub use routes::create_api_router;
pub use state::{AppState, ChatSettings, TraceBackend};
