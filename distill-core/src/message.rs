//! Role-tagged messages.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ROLE
// ============================================================================

/// Normalized speaker of a message.
///
/// Serialized as the LangChain-style `type` tag (`system`, `human`, `ai`,
/// `tool`). Tags that match none of the known aliases are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    System,
    Human,
    Ai,
    Tool,
    Other(String),
}

impl Role {
    /// Parse a role or type tag, accepting the aliases used by the agent
    /// framework and by chat-completion style payloads.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "system" | "system_message" | "systemmessage" | "systemmessagechunk" => Role::System,
            "human" | "user" | "human_message" | "humanmessage" | "humanmessagechunk" => {
                Role::Human
            }
            "ai" | "assistant" | "ai_message" | "aimessage" | "aimessagechunk" => Role::Ai,
            "tool" | "observation" | "tool_message" | "toolmessage" | "toolmessagechunk" => {
                Role::Tool
            }
            _ => Role::Other(tag.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::System => "system",
            Role::Human => "human",
            Role::Ai => "ai",
            Role::Tool => "tool",
            Role::Other(tag) => tag,
        }
    }

    /// Whether this role is one of the four normalized roles.
    pub fn is_known(&self) -> bool {
        !matches!(self, Role::Other(_))
    }
}

impl FromStr for Role {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Role::parse(s))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Role::parse(&tag))
    }
}

// ============================================================================
// MESSAGE
// ============================================================================

/// One entry of a refined transcript.
///
/// Fields other than `type` and `content` (ids, tool calls, observation
/// names) ride along in `metadata` and are flattened into the same JSON
/// object on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            metadata: Map::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(Role::Human, content)
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(Role::Ai, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }

    /// Attach a metadata field. `type` and `content` are reserved and ignored.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if key != "type" && key != "content" {
            self.metadata.insert(key, value);
        }
        self
    }

    /// Replace the content, keeping role and metadata.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_aliases() {
        assert_eq!(Role::parse("user"), Role::Human);
        assert_eq!(Role::parse("assistant"), Role::Ai);
        assert_eq!(Role::parse("ai_message"), Role::Ai);
        assert_eq!(Role::parse("tool_message"), Role::Tool);
        assert_eq!(Role::parse("observation"), Role::Tool);
        assert_eq!(Role::parse("SystemMessage"), Role::System);
        assert_eq!(Role::parse(" System "), Role::System);
    }

    #[test]
    fn test_unknown_role_keeps_original_tag() {
        let role = Role::parse("FunctionMessage");
        assert_eq!(role, Role::Other("FunctionMessage".to_string()));
        assert_eq!(role.as_str(), "FunctionMessage");
        assert!(!role.is_known());
    }

    #[test]
    fn test_message_serializes_type_and_flattened_metadata() -> Result<(), serde_json::Error> {
        let msg = Message::ai("hello").with_metadata("id", json!("run-1"));
        let value = serde_json::to_value(&msg)?;
        assert_eq!(value, json!({"type": "ai", "content": "hello", "id": "run-1"}));
        Ok(())
    }

    #[test]
    fn test_reserved_metadata_keys_ignored() {
        let msg = Message::tool("out")
            .with_metadata("type", json!("ai"))
            .with_metadata("content", json!("other"));
        assert!(msg.metadata.is_empty());
        assert_eq!(msg.role, Role::Tool);
    }

    #[test]
    fn test_message_deserializes_aliases() -> Result<(), serde_json::Error> {
        let msg: Message = serde_json::from_value(json!({
            "type": "ai_message",
            "content": "x",
            "tool_calls": []
        }))?;
        assert_eq!(msg.role, Role::Ai);
        assert_eq!(msg.metadata.get("tool_calls"), Some(&json!([])));
        Ok(())
    }
}
