//! DISTILL Core - Entity Types
//!
//! Pure data structures shared by every other crate: messages, the tracing
//! service's trace document, per-request records and the error taxonomy.
//! This crate contains ONLY data types - no transformation logic.

pub mod error;
pub mod message;
pub mod prompt;
pub mod record;
pub mod trace;

pub use error::{AgentError, ConfigError, DistillError, DistillResult, StorageError, TraceError};
pub use message::{Message, Role};
pub use prompt::{
    DEFAULT_SYSTEM_PROMPT, REASONING_CLOSE, REASONING_OPEN, REASONING_SUFFIX,
};
pub use record::{AgentRun, RawRecord, RefinedTranscript};
pub use trace::{
    ContentPart, MessageContent, Observation, ObservationKind, PromptEntry, PromptInput,
    PromptMessage, TraceDocument,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Identifier of one agent invocation in the tracing service.
///
/// Minted locally as the 32-char lowercase hex form of a UUIDv7 so ids sort
/// by creation time, but any string returned by the service is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(String);

impl TraceId {
    /// Mint a fresh, timestamp-sortable trace id.
    pub fn new() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    /// Wrap an id handed out by another system.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TraceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_id_is_lower_hex() {
        let id = TraceId::new();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_trace_ids_are_unique() {
        let a = TraceId::new();
        let b = TraceId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_trace_id_serializes_as_plain_string() -> Result<(), serde_json::Error> {
        let id = TraceId::from_string("abc123");
        assert_eq!(serde_json::to_string(&id)?, "\"abc123\"");
        let back: TraceId = serde_json::from_str("\"abc123\"")?;
        assert_eq!(back, id);
        Ok(())
    }
}
