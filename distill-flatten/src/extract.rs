//! Message extraction from raw agent logs and observation payloads.

use distill_core::{ContentPart, Message, Role};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Type tags that mark a log mapping as a message record.
const MESSAGE_TYPES: &[&str] = &["ai", "tool", "ai_message", "tool_message"];

/// Collect the assistant and tool message records from a raw execution log.
///
/// Lists are walked in order. A mapping whose `type` is one of the message
/// tags is taken whole, with its type normalized; any other mapping is
/// searched value by value in map order.
pub fn extract_log_messages(log: &[Value]) -> Vec<Message> {
    let mut out = Vec::new();
    for entry in log {
        walk(entry, &mut out);
    }
    out
}

fn walk(value: &Value, out: &mut Vec<Message>) {
    match value {
        Value::Array(items) => {
            for item in items {
                walk(item, out);
            }
        }
        Value::Object(map) => {
            let is_message = map
                .get("type")
                .and_then(Value::as_str)
                .map(|t| MESSAGE_TYPES.contains(&t))
                .unwrap_or(false);
            if is_message {
                if let Some(message) = message_from_record(map) {
                    out.push(message);
                }
            } else {
                for v in map.values() {
                    walk(v, out);
                }
            }
        }
        _ => {}
    }
}

/// Build a message from a `{type, content, ...}` mapping, keeping every
/// other field as metadata. Returns `None` when there is no `type` tag.
pub fn message_from_record(map: &Map<String, Value>) -> Option<Message> {
    let role = Role::parse(map.get("type")?.as_str()?);
    let content = map.get("content").map(output_text).unwrap_or_default();
    let mut message = Message::new(role, content);
    for (key, value) in map {
        message = message.with_metadata(key.clone(), value.clone());
    }
    Some(message)
}

/// Text carried by an observation output or a message content field.
///
/// Strings pass through; `{content}` / `{text}` mappings and lists of text
/// parts are unwrapped; anything else is serialized to compact JSON.
pub fn output_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            if let Some(content) = map.get("content") {
                if let Some(text) = content_text(content) {
                    return text;
                }
            }
            if let Some(Value::String(text)) = map.get("text") {
                return text.clone();
            }
            value.to_string()
        }
        Value::Array(_) => content_text(value).unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}

fn content_text(content: &Value) -> Option<String> {
    match content {
        Value::Null => Some(String::new()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) => {
            let parts = Vec::<ContentPart>::deserialize(content).ok()?;
            let mut texts = Vec::with_capacity(parts.len());
            for part in &parts {
                match part {
                    ContentPart::Text { text } => texts.push(text.as_str()),
                    ContentPart::Other(_) => return None,
                }
            }
            Some(texts.join("\n"))
        }
        _ => None,
    }
}
