//! Langfuse tracing service
//!
//! Reads full traces from the public REST API and upserts trace fields
//! through the batch ingestion endpoint.

pub mod client;
pub mod types;

pub use client::{LangfuseClient, LangfuseCredentials};
