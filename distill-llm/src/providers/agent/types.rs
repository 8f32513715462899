//! Agent service request and response types

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct GoRequest<'a> {
    pub instruction: &'a str,
    pub trace_id: &'a str,
    pub trace_name: &'a str,
    pub data_path: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoResponse {
    #[serde(default, alias = "response_log")]
    pub log: Vec<Value>,
    /// Usually a string; anything else is rendered as JSON text.
    #[serde(default, alias = "final_answer", alias = "response")]
    pub answer: Value,
}

impl GoResponse {
    pub fn answer_text(&self) -> String {
        match &self.answer {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentErrorBody {
    #[serde(alias = "error", alias = "message")]
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_go_response_aliases() {
        let body: GoResponse = serde_json::from_value(json!({
            "response_log": [{"type": "ai", "content": "x"}],
            "final_answer": "42"
        }))
        .expect("aliases parse");
        assert_eq!(body.log.len(), 1);
        assert_eq!(body.answer_text(), "42");
    }

    #[test]
    fn test_non_string_answer_is_rendered() {
        let body: GoResponse =
            serde_json::from_value(json!({"log": [], "answer": {"value": 42}})).expect("parses");
        assert_eq!(body.answer_text(), "{\"value\":42}");
    }
}
