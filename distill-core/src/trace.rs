//! Typed view of the tracing service's trace document.
//!
//! Mirrors the subset of the public trace API that the flattener reads.
//! Unknown fields are ignored; input/output payloads stay untyped because
//! their shape depends on the agent framework that produced them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashSet;

use crate::{Role, Timestamp};

// ============================================================================
// OBSERVATIONS
// ============================================================================

/// Kind of a trace node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObservationKind {
    /// Model output.
    Generation,
    /// Tool or sub-operation execution.
    Span,
    /// Point-in-time event.
    Event,
    /// Any kind this crate does not know, kept verbatim.
    Other(String),
}

impl ObservationKind {
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "GENERATION" => ObservationKind::Generation,
            "SPAN" => ObservationKind::Span,
            "EVENT" => ObservationKind::Event,
            _ => ObservationKind::Other(tag.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ObservationKind::Generation => "GENERATION",
            ObservationKind::Span => "SPAN",
            ObservationKind::Event => "EVENT",
            ObservationKind::Other(tag) => tag,
        }
    }
}

impl Serialize for ObservationKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ObservationKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(ObservationKind::parse(&tag))
    }
}

/// One node of a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ObservationKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub start_time: Option<Timestamp>,
    #[serde(default)]
    pub end_time: Option<Timestamp>,
    #[serde(default)]
    pub parent_observation_id: Option<String>,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
}

impl Observation {
    pub fn is_error(&self) -> bool {
        self.level
            .as_deref()
            .map(|l| l.eq_ignore_ascii_case("ERROR"))
            .unwrap_or(false)
    }
}

/// Full trace as returned by the tracing service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub observations: Vec<Observation>,
}

impl TraceDocument {
    /// Observations ordered by start time, ties broken by id so the order
    /// never depends on the order the service happened to return them in.
    /// Observations without a start time sort first.
    pub fn sorted_observations(&self) -> Vec<&Observation> {
        let mut sorted: Vec<&Observation> = self.observations.iter().collect();
        sorted.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        sorted
    }

    /// Ids of observations that have at least one child.
    pub fn parent_ids(&self) -> HashSet<&str> {
        self.observations
            .iter()
            .filter_map(|o| o.parent_observation_id.as_deref())
            .collect()
    }
}

// ============================================================================
// PROMPT MESSAGES
// ============================================================================

/// One part of a multi-part message content.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text { text: String },
    Other(Value),
}

/// Message content: a plain string or a list of parts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenated text, parts joined by newlines. Non-text parts are skipped.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Other(_) => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Kwargs of a LangChain-serialized message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SerializedKwargs {
    #[serde(default)]
    pub content: Option<MessageContent>,
}

/// A prompt message in one of the shapes found in generation inputs and
/// agent logs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PromptMessage {
    /// `{"lc": 1, "type": "constructor", "id": [..., "SystemMessage"], "kwargs": {...}}`
    Serialized {
        id: Vec<String>,
        kwargs: SerializedKwargs,
    },
    /// `{"role": "system", "content": ...}`
    RoleTagged {
        role: String,
        #[serde(default)]
        content: Option<MessageContent>,
    },
    /// `{"type": "system", "content": ...}`
    TypeTagged {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        content: Option<MessageContent>,
    },
}

impl PromptMessage {
    pub fn role(&self) -> Role {
        match self {
            PromptMessage::Serialized { id, .. } => id
                .last()
                .map(|class| Role::parse(class))
                .unwrap_or_else(|| Role::Other(String::new())),
            PromptMessage::RoleTagged { role, .. } => Role::parse(role),
            PromptMessage::TypeTagged { kind, .. } => Role::parse(kind),
        }
    }

    pub fn content_text(&self) -> String {
        let content = match self {
            PromptMessage::Serialized { kwargs, .. } => kwargs.content.as_ref(),
            PromptMessage::RoleTagged { content, .. } => content.as_ref(),
            PromptMessage::TypeTagged { content, .. } => content.as_ref(),
        };
        content.map(MessageContent::text).unwrap_or_default()
    }
}

/// A list entry that may or may not be a prompt message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PromptEntry {
    Message(PromptMessage),
    Other(Value),
}

/// The known container shapes of a generation input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PromptInput {
    /// Batched chat input: `[[msg, msg], ...]`.
    Batch(Vec<Vec<PromptEntry>>),
    /// Plain chat input: `[msg, msg]`.
    List(Vec<PromptEntry>),
    /// Graph state: `{"messages": ...}`.
    Wrapped { messages: Box<PromptInput> },
    /// A single message.
    Single(PromptMessage),
}

impl PromptInput {
    /// Parse a payload, returning `None` when it matches no known shape.
    pub fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            return None;
        }
        PromptInput::deserialize(value).ok()
    }

    /// Prompt messages in payload order.
    pub fn messages(&self) -> Vec<&PromptMessage> {
        fn entries(list: &[PromptEntry]) -> impl Iterator<Item = &PromptMessage> {
            list.iter().filter_map(|e| match e {
                PromptEntry::Message(m) => Some(m),
                PromptEntry::Other(_) => None,
            })
        }
        match self {
            PromptInput::Batch(batch) => batch.iter().flat_map(|l| entries(l)).collect(),
            PromptInput::List(list) => entries(list).collect(),
            PromptInput::Wrapped { messages } => messages.messages(),
            PromptInput::Single(m) => vec![m],
        }
    }
}
