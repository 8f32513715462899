//! Langfuse public API request and response types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// INGESTION TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct IngestionBatch {
    pub batch: Vec<IngestionEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionEvent {
    /// Event id, unique per event (not the trace id).
    pub id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub body: TraceBody,
}

/// Body of a `trace-create` event. Sending it for an existing id upserts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraceBody {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestionResponse {
    #[serde(default)]
    pub errors: Vec<IngestionError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestionError {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub message: Option<String>,
}

// ============================================================================
// SHARED TYPES
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
}
