//! Per-request records: what the agent returned, what gets persisted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Message, Timestamp, TraceId};

/// Output of one agent invocation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentRun {
    /// Raw execution log, one entry per framework message or step.
    #[serde(default)]
    pub log: Vec<Value>,
    /// Final answer string.
    #[serde(default)]
    pub final_answer: String,
}

/// Unmodified inputs and outputs of one request, written to `raw/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub trace_id: TraceId,
    pub timestamp: Timestamp,
    pub instruction: String,
    /// Trace document exactly as the tracing service returned it.
    pub langfuse_full_trace: Option<Value>,
    pub response_log: Vec<Value>,
    pub final_answer: String,
}

/// Normalized transcript for fine-tuning, written to `refined/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinedTranscript {
    pub trace_id: TraceId,
    pub final_answer: String,
    pub messages: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_agent_run_defaults_missing_fields() -> Result<(), serde_json::Error> {
        let run: AgentRun = serde_json::from_value(json!({"final_answer": "42"}))?;
        assert!(run.log.is_empty());
        assert_eq!(run.final_answer, "42");
        Ok(())
    }

    #[test]
    fn test_refined_transcript_shape() -> Result<(), serde_json::Error> {
        let transcript = RefinedTranscript {
            trace_id: TraceId::from_string("t1"),
            final_answer: "42".to_string(),
            messages: vec![Message::system("S"), Message::human("Q"), Message::ai("42")],
        };
        let value = serde_json::to_value(&transcript)?;
        assert_eq!(value["trace_id"], json!("t1"));
        assert_eq!(value["messages"][2], json!({"type": "ai", "content": "42"}));
        Ok(())
    }
}
