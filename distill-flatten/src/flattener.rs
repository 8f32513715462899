//! The flattener: trace or log in, ordered transcript out.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use distill_core::{
    ConfigError, DistillResult, Message, ObservationKind, RefinedTranscript, Role, TraceDocument,
    TraceId, DEFAULT_SYSTEM_PROMPT, REASONING_CLOSE, REASONING_OPEN, REASONING_SUFFIX,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::extract::{extract_log_messages, output_text};
use crate::system::{discover_system_prompt, discover_system_prompt_in_log};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Which record is the source of truth for the assistant/tool transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSource {
    /// The fetched trace when there is one, the raw agent log otherwise.
    #[default]
    Auto,
    /// Always the fetched trace (an absent trace yields no steps).
    Trace,
    /// Always the raw agent log.
    AgentLog,
}

impl FromStr for TranscriptSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(TranscriptSource::Auto),
            "trace" => Ok(TranscriptSource::Trace),
            "log" | "agent_log" => Ok(TranscriptSource::AgentLog),
            other => Err(ConfigError::InvalidValue {
                field: "transcript_source".to_string(),
                value: other.to_string(),
                reason: "expected one of: auto, trace, log".to_string(),
            }),
        }
    }
}

/// Flattener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlattenConfig {
    /// System prompt used when the source records none.
    pub default_system_prompt: String,
    /// Appended to a discovered prompt that never mentions the opening delimiter.
    pub reasoning_suffix: String,
    pub reasoning_open: String,
    pub reasoning_close: String,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            default_system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            reasoning_suffix: REASONING_SUFFIX.to_string(),
            reasoning_open: REASONING_OPEN.to_string(),
            reasoning_close: REASONING_CLOSE.to_string(),
        }
    }
}

// ============================================================================
// OUTPUT
// ============================================================================

/// Role a step plays in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Intermediate assistant reasoning.
    Thought,
    /// Assistant content equal to the final answer.
    Answer,
    /// Tool or observation output.
    ToolResult,
    /// Node of an unrecognized kind, kept with its own type tag.
    Passthrough,
}

/// One transcript entry after the system and human messages. `message`
/// holds cleaned, unwrapped content.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub kind: StepKind,
    pub message: Message,
}

/// Where the steps of a transcript came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptOrigin {
    Trace,
    AgentLog,
}

impl fmt::Display for TranscriptOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptOrigin::Trace => f.write_str("trace"),
            TranscriptOrigin::AgentLog => f.write_str("agent_log"),
        }
    }
}

/// Flattened transcript, renderable for display or for training.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedTranscript {
    pub origin: TranscriptOrigin,
    pub system: Message,
    pub human: Message,
    pub steps: Vec<Step>,
    /// Final answer with reasoning delimiters removed.
    pub final_answer: String,
    reasoning_open: String,
    reasoning_close: String,
}

impl FlattenedTranscript {
    /// Messages with cleaned content, no reasoning blocks.
    pub fn display_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.steps.len() + 2);
        messages.push(self.system.clone());
        messages.push(self.human.clone());
        messages.extend(self.steps.iter().map(|s| s.message.clone()));
        messages
    }

    /// Messages for a fine-tuning dataset: every thought wrapped in one
    /// reasoning block, the answer left bare.
    pub fn training_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.steps.len() + 2);
        messages.push(self.system.clone());
        messages.push(self.human.clone());
        for step in &self.steps {
            let message = match step.kind {
                StepKind::Thought => {
                    let wrapped = wrap(&self.reasoning_open, &self.reasoning_close, &step.message.content);
                    step.message.clone().with_content(wrapped)
                }
                _ => step.message.clone(),
            };
            messages.push(message);
        }
        messages
    }

    /// Content of every intermediate reasoning step, in order.
    pub fn thoughts(&self) -> Vec<&str> {
        self.contents_of(StepKind::Thought)
    }

    /// Content of every tool result, in order.
    pub fn tool_results(&self) -> Vec<&str> {
        self.contents_of(StepKind::ToolResult)
    }

    pub fn into_refined(self, trace_id: TraceId) -> RefinedTranscript {
        RefinedTranscript {
            trace_id,
            messages: self.training_messages(),
            final_answer: self.final_answer,
        }
    }

    fn contents_of(&self, kind: StepKind) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.message.content.as_str())
            .collect()
    }
}

fn compile(pattern: &str) -> DistillResult<Regex> {
    Regex::new(pattern).map_err(|e| {
        ConfigError::InvalidValue {
            field: "reasoning delimiters".to_string(),
            value: pattern.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn wrap(open: &str, close: &str, text: &str) -> String {
    format!("{}\n{}\n{}", open, text, close)
}

// ============================================================================
// FLATTENER
// ============================================================================

/// Stateless trace flattener.
#[derive(Debug, Clone)]
pub struct Flattener {
    config: FlattenConfig,
    delimiters: Regex,
    blocks: Regex,
}

impl Flattener {
    pub fn new(config: FlattenConfig) -> DistillResult<Self> {
        if config.reasoning_open.is_empty() || config.reasoning_close.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "reasoning delimiters".to_string(),
                value: format!("{:?} / {:?}", config.reasoning_open, config.reasoning_close),
                reason: "delimiters must not be empty".to_string(),
            }
            .into());
        }
        let open = regex::escape(&config.reasoning_open);
        let close = regex::escape(&config.reasoning_close);
        let delimiters = compile(&format!("{}|{}", open, close))?;
        let blocks = compile(&format!("(?s){}.*?{}", open, close))?;
        Ok(Self {
            config,
            delimiters,
            blocks,
        })
    }

    pub fn config(&self) -> &FlattenConfig {
        &self.config
    }

    /// Remove every reasoning delimiter and trim surrounding whitespace.
    pub fn clean_reasoning(&self, text: &str) -> String {
        self.delimiters.replace_all(text, "").trim().to_string()
    }

    /// Remove whole reasoning blocks, delimiters and contents, then trim.
    pub fn strip_reasoning_blocks(&self, text: &str) -> String {
        self.blocks.replace_all(text, "").trim().to_string()
    }

    /// Wrap text in one reasoning block, one newline inside each delimiter.
    pub fn wrap_reasoning(&self, text: &str) -> String {
        wrap(&self.config.reasoning_open, &self.config.reasoning_close, text)
    }

    /// Use a discovered prompt verbatim (plus the reasoning suffix when it
    /// never mentions the opening delimiter), or the default prompt.
    pub fn resolve_system_prompt(&self, found: Option<String>) -> String {
        match found {
            Some(prompt) if prompt.contains(&self.config.reasoning_open) => prompt,
            Some(prompt) => format!("{}{}", prompt, self.config.reasoning_suffix),
            None => self.config.default_system_prompt.clone(),
        }
    }

    /// Flatten from whichever record `source` selects.
    ///
    /// Under [`TranscriptSource::Auto`] a trace that yields no steps gives
    /// way to the agent log when the log has any.
    pub fn flatten(
        &self,
        source: TranscriptSource,
        trace: Option<&TraceDocument>,
        log: &[Value],
        instruction: &str,
        final_answer: &str,
    ) -> FlattenedTranscript {
        match (source, trace) {
            (TranscriptSource::AgentLog, _) | (TranscriptSource::Auto, None) => {
                self.flatten_log(log, instruction, final_answer)
            }
            (TranscriptSource::Auto, Some(trace)) => {
                let from_trace = self.flatten_trace(trace, instruction, final_answer);
                if !from_trace.steps.is_empty() {
                    return from_trace;
                }
                let from_log = self.flatten_log(log, instruction, final_answer);
                if from_log.steps.is_empty() {
                    return from_trace;
                }
                tracing::warn!(
                    trace_id = %trace.id,
                    observations = trace.observations.len(),
                    log_steps = from_log.steps.len(),
                    "Trace yielded no steps, using agent log"
                );
                from_log
            }
            (TranscriptSource::Trace, Some(trace)) => {
                self.flatten_trace(trace, instruction, final_answer)
            }
            (TranscriptSource::Trace, None) => {
                self.flatten_trace(&TraceDocument::default(), instruction, final_answer)
            }
        }
    }

    /// Flatten a fetched trace document.
    ///
    /// Generations become assistant steps; leaf spans become tool results;
    /// spans with children are containers and emit nothing; any other kind
    /// is passed through under its original type tag.
    pub fn flatten_trace(
        &self,
        trace: &TraceDocument,
        instruction: &str,
        final_answer: &str,
    ) -> FlattenedTranscript {
        let parents = trace.parent_ids();
        let candidates = trace.sorted_observations().into_iter().filter_map(|obs| {
            let role = match &obs.kind {
                ObservationKind::Generation => Role::Ai,
                ObservationKind::Span if parents.contains(obs.id.as_str()) => return None,
                ObservationKind::Span => Role::Tool,
                other => Role::Other(other.as_str().to_string()),
            };
            let mut message = Message::new(role, output_text(&obs.output))
                .with_metadata("id", json!(obs.id));
            if let Some(name) = &obs.name {
                message = message.with_metadata("name", json!(name));
            }
            if obs.is_error() {
                message = message.with_metadata("level", json!("ERROR"));
                if let Some(status) = &obs.status_message {
                    message = message.with_metadata("status_message", json!(status));
                }
            }
            Some(message)
        });

        let steps = self.build_steps(candidates, final_answer);
        let system = self.resolve_system_prompt(discover_system_prompt(trace));
        tracing::debug!(
            trace_id = %trace.id,
            observations = trace.observations.len(),
            steps = steps.len(),
            "Flattened trace document"
        );
        self.assemble(TranscriptOrigin::Trace, system, instruction, steps, final_answer)
    }

    /// Flatten the agent's raw execution log.
    pub fn flatten_log(
        &self,
        log: &[Value],
        instruction: &str,
        final_answer: &str,
    ) -> FlattenedTranscript {
        let steps = self.build_steps(extract_log_messages(log), final_answer);
        let system = self.resolve_system_prompt(discover_system_prompt_in_log(log));
        tracing::debug!(entries = log.len(), steps = steps.len(), "Flattened agent log");
        self.assemble(TranscriptOrigin::AgentLog, system, instruction, steps, final_answer)
    }

    fn assemble(
        &self,
        origin: TranscriptOrigin,
        system: String,
        instruction: &str,
        steps: Vec<Step>,
        final_answer: &str,
    ) -> FlattenedTranscript {
        FlattenedTranscript {
            origin,
            system: Message::system(system),
            human: Message::human(instruction),
            steps,
            final_answer: self.clean_reasoning(final_answer),
            reasoning_open: self.config.reasoning_open.clone(),
            reasoning_close: self.config.reasoning_close.clone(),
        }
    }

    /// Apply cleaning, dedup and classification to candidate messages in
    /// chronological order.
    ///
    /// An assistant step is the answer when its cleaned content equals the
    /// cleaned final answer, or when it does once its reasoning blocks are
    /// dropped (`<think>..</think>42` against `42`). The answer step carries
    /// the bare final answer.
    fn build_steps(
        &self,
        candidates: impl IntoIterator<Item = Message>,
        final_answer: &str,
    ) -> Vec<Step> {
        let clean_final = self.clean_reasoning(final_answer);
        let mut seen: HashSet<String> = HashSet::new();
        let mut steps = Vec::new();

        for candidate in candidates {
            let cleaned = self.clean_reasoning(&candidate.content);
            if cleaned.is_empty() {
                continue;
            }
            let (kind, content) = match &candidate.role {
                Role::Ai => {
                    if !seen.insert(cleaned.clone()) {
                        continue;
                    }
                    let is_answer = !clean_final.is_empty()
                        && (cleaned == clean_final
                            || self.strip_reasoning_blocks(&candidate.content) == clean_final);
                    if is_answer {
                        if !seen.insert(clean_final.clone()) && cleaned != clean_final {
                            continue;
                        }
                        (StepKind::Answer, clean_final.clone())
                    } else {
                        (StepKind::Thought, cleaned)
                    }
                }
                Role::Tool => (StepKind::ToolResult, cleaned),
                // Already represented by the leading system/human pair.
                Role::System | Role::Human => continue,
                Role::Other(_) => (StepKind::Passthrough, cleaned),
            };
            steps.push(Step {
                kind,
                message: candidate.with_content(content),
            });
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flattener() -> Flattener {
        match Flattener::new(FlattenConfig::default()) {
            Ok(f) => f,
            Err(e) => panic!("default config must build: {}", e),
        }
    }

    fn doc(value: Value) -> TraceDocument {
        match serde_json::from_value(value) {
            Ok(doc) => doc,
            Err(e) => panic!("fixture must parse: {}", e),
        }
    }

    fn generation(id: &str, second: u32, output: &str) -> Value {
        json!({
            "id": id,
            "type": "GENERATION",
            "startTime": format!("2025-01-01T00:00:{:02}Z", second),
            "output": output
        })
    }

    #[test]
    fn test_clean_and_wrap() {
        let f = flattener();
        assert_eq!(f.clean_reasoning("  <think>plan</think> act \n"), "plan act");
        assert_eq!(f.clean_reasoning(""), "");
        assert_eq!(f.wrap_reasoning("plan"), "<think>\nplan\n</think>");
        assert_eq!(f.strip_reasoning_blocks("<think>a\nb</think> 42 <think>c</think>"), "42");
    }

    #[test]
    fn test_empty_trace_yields_system_and_human_only() {
        let f = flattener();
        let out = f.flatten_trace(&doc(json!({"id": "t", "observations": []})), "Q", "A");
        let messages = out.training_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(messages[1], Message::human("Q"));
    }

    #[test]
    fn test_final_answer_is_terminal_and_unwrapped() {
        let f = flattener();
        let trace = doc(json!({
            "id": "t",
            "observations": [generation("g1", 1, "<think>thinking</think>42")]
        }));
        let out = f.flatten_trace(&trace, "What is 6*7?", "42");
        let messages = out.training_messages();
        let last = messages.last().map(|m| (m.role.clone(), m.content.clone()));
        assert_eq!(last, Some((Role::Ai, "42".to_string())));
        assert_eq!(out.steps[0].kind, StepKind::Answer);
    }

    #[test]
    fn test_intermediate_content_is_wrapped_once() {
        let f = flattener();
        let trace = doc(json!({
            "id": "t",
            "observations": [
                generation("g1", 1, "<think>look up data</think>"),
                generation("g2", 2, "done")
            ]
        }));
        let out = f.flatten_trace(&trace, "Q", "done");
        let messages = out.training_messages();
        assert_eq!(messages[2].content, "<think>\nlook up data\n</think>");
        assert_eq!(messages[3].content, "done");
        assert_eq!(out.thoughts(), vec!["look up data"]);

        let display = out.display_messages();
        assert_eq!(display[2].content, "look up data");
    }

    #[test]
    fn test_duplicate_assistant_content_dropped() {
        let f = flattener();
        let trace = doc(json!({
            "id": "t",
            "observations": [
                generation("g1", 1, "step"),
                generation("g2", 2, "<think>step</think>"),
                generation("g3", 3, "answer"),
                generation("g4", 4, "answer")
            ]
        }));
        let out = f.flatten_trace(&trace, "Q", "answer");
        let contents: Vec<&str> = out.steps.iter().map(|s| s.message.content.as_str()).collect();
        assert_eq!(contents, vec!["step", "answer"]);
        assert_eq!(out.steps[0].message.metadata.get("id"), Some(&json!("g1")));
    }

    #[test]
    fn test_span_containers_skipped_and_leaves_become_tools() {
        let f = flattener();
        let trace = doc(json!({
            "id": "t",
            "observations": [
                {"id": "root", "type": "SPAN", "name": "LangGraph",
                 "startTime": "2025-01-01T00:00:00Z", "output": {"messages": []}},
                {"id": "g1", "type": "GENERATION", "parentObservationId": "root",
                 "startTime": "2025-01-01T00:00:01Z", "output": {"role": "assistant", "content": "run code"}},
                {"id": "exec", "type": "SPAN", "name": "execute", "parentObservationId": "root",
                 "startTime": "2025-01-01T00:00:02Z", "output": "<think>ignored tag</think>rows=3"},
                {"id": "ev", "type": "EVENT", "name": "note", "parentObservationId": "root",
                 "startTime": "2025-01-01T00:00:03Z", "output": "checkpoint"}
            ]
        }));
        let out = f.flatten_trace(&trace, "Q", "final");
        let summary: Vec<(StepKind, Role, &str)> = out
            .steps
            .iter()
            .map(|s| (s.kind, s.message.role.clone(), s.message.content.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (StepKind::Thought, Role::Ai, "run code"),
                (StepKind::ToolResult, Role::Tool, "ignored tagrows=3"),
                (StepKind::Passthrough, Role::Other("EVENT".to_string()), "checkpoint"),
            ]
        );
        assert_eq!(out.tool_results(), vec!["ignored tagrows=3"]);
        let training = out.training_messages();
        assert_eq!(training[3].content, "ignored tagrows=3");
    }

    #[test]
    fn test_observations_sorted_by_start_time() {
        let f = flattener();
        let trace = doc(json!({
            "id": "t",
            "observations": [generation("late", 9, "second"), generation("early", 1, "first")]
        }));
        let out = f.flatten_trace(&trace, "Q", "none");
        assert_eq!(out.thoughts(), vec!["first", "second"]);
    }

    #[test]
    fn test_discovered_prompt_gets_suffix_once() {
        let f = flattener();
        let plain = f.resolve_system_prompt(Some("Be helpful.".to_string()));
        assert_eq!(plain, format!("Be helpful.{}", REASONING_SUFFIX));
        let already = f.resolve_system_prompt(Some("Use <think> tags.".to_string()));
        assert_eq!(already, "Use <think> tags.");
        assert_eq!(f.resolve_system_prompt(None), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_error_observation_keeps_status() {
        let f = flattener();
        let trace = doc(json!({
            "id": "t",
            "observations": [{
                "id": "tool", "type": "SPAN", "level": "ERROR",
                "statusMessage": "timeout", "output": "partial"
            }]
        }));
        let out = f.flatten_trace(&trace, "Q", "A");
        let meta = &out.steps[0].message.metadata;
        assert_eq!(meta.get("level"), Some(&json!("ERROR")));
        assert_eq!(meta.get("status_message"), Some(&json!("timeout")));
    }

    #[test]
    fn test_flatten_log_matches_rules() {
        let f = flattener();
        let log = vec![
            json!({"type": "ai", "content": "<think>plan</think>", "id": "a1"}),
            json!({"type": "tool", "content": "<observation>ok</observation>"}),
            json!({"type": "ai", "content": "plan"}),
            json!({"type": "ai", "content": ""}),
            json!({"type": "ai", "content": "<solution>42</solution>"}),
        ];
        let out = f.flatten_log(&log, "Q", "<solution>42</solution>");
        assert_eq!(out.origin, TranscriptOrigin::AgentLog);
        let training = out.training_messages();
        let contents: Vec<&str> = training.iter().skip(2).map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "<think>\nplan\n</think>",
                "<observation>ok</observation>",
                "<solution>42</solution>",
            ]
        );
        assert_eq!(training[2].metadata.get("id"), Some(&json!("a1")));
    }

    #[test]
    fn test_source_selection() {
        let f = flattener();
        let trace = doc(json!({"id": "t", "observations": [generation("g", 1, "from trace")]}));
        let log = vec![json!({"type": "ai", "content": "from log"})];

        let auto = f.flatten(TranscriptSource::Auto, Some(&trace), &log, "Q", "x");
        assert_eq!(auto.origin, TranscriptOrigin::Trace);
        assert_eq!(auto.thoughts(), vec!["from trace"]);

        let fallback = f.flatten(TranscriptSource::Auto, None, &log, "Q", "x");
        assert_eq!(fallback.thoughts(), vec!["from log"]);

        let forced = f.flatten(TranscriptSource::AgentLog, Some(&trace), &log, "Q", "x");
        assert_eq!(forced.origin, TranscriptOrigin::AgentLog);

        let empty = f.flatten(TranscriptSource::Trace, None, &log, "Q", "x");
        assert!(empty.steps.is_empty());
    }

    #[test]
    fn test_auto_uses_log_when_trace_has_no_steps() {
        let f = flattener();
        let pending = doc(json!({"id": "t", "observations": []}));
        let log = vec![
            json!({"type": "human", "content": "Q"}),
            json!({"type": "ai", "content": "<think>plan</think>"}),
            json!({"type": "ai", "content": "42"}),
        ];

        let out = f.flatten(TranscriptSource::Auto, Some(&pending), &log, "Q", "42");
        assert_eq!(out.origin, TranscriptOrigin::AgentLog);
        assert_eq!(out.thoughts(), vec!["plan"]);
        assert_eq!(out.training_messages().len(), 4);

        let forced = f.flatten(TranscriptSource::Trace, Some(&pending), &log, "Q", "42");
        assert_eq!(forced.origin, TranscriptOrigin::Trace);
        assert!(forced.steps.is_empty());

        let both_empty = f.flatten(TranscriptSource::Auto, Some(&pending), &[], "Q", "42");
        assert_eq!(both_empty.origin, TranscriptOrigin::Trace);
    }

    #[test]
    fn test_transcript_source_parse() {
        assert_eq!("LOG".parse::<TranscriptSource>(), Ok(TranscriptSource::AgentLog));
        assert_eq!("trace".parse::<TranscriptSource>(), Ok(TranscriptSource::Trace));
        assert!("sometimes".parse::<TranscriptSource>().is_err());
    }

    #[test]
    fn test_empty_delimiters_rejected() {
        let config = FlattenConfig {
            reasoning_open: String::new(),
            ..FlattenConfig::default()
        };
        assert!(Flattener::new(config).is_err());
    }

    #[test]
    fn test_into_refined_uses_training_shape() {
        let f = flattener();
        let trace = doc(json!({"id": "t", "observations": [generation("g", 1, "thinking")]}));
        let refined = f
            .flatten_trace(&trace, "Q", "<think></think>answer")
            .into_refined(TraceId::from_string("t"));
        assert_eq!(refined.final_answer, "answer");
        assert_eq!(refined.messages[2].content, "<think>\nthinking\n</think>");
    }
}
