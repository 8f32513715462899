//! Remote reasoning agent reached over HTTP
//!
//! The agent runs as its own service; this module posts instructions to it
//! and maps its reply onto [`distill_core::AgentRun`].

pub mod client;
pub mod provider;
pub mod types;

pub use client::AgentClient;
pub use provider::{HttpAgentFactory, HttpAgentProvider};
