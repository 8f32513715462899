//! DISTILL Test Utilities
//!
//! Centralized test infrastructure for the DISTILL workspace:
//! - Mock agent and tracing service implementations
//! - Proptest generators for agent logs and trace documents
//! - Test fixtures for common scenarios
//! - Custom assertions for DISTILL-specific validation

// Re-export mock storage from its source crate
pub use distill_storage::{MockTranscriptStore, StoredAt, TranscriptStore};

// Re-export core types for convenience
pub use distill_core::{
    AgentError, AgentRun, DistillError, DistillResult, Message, RawRecord, RefinedTranscript,
    Role, StorageError, TraceDocument, TraceError, TraceId,
};
pub use distill_llm::{AgentFactory, AgentProvider, TraceContext, TraceSink, TraceSource, TraceUpdate};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// MOCK AGENT
// ============================================================================

/// Scripted reasoning agent.
///
/// Every invocation returns the same run, or fails with the configured
/// reason. Instructions and trace contexts are recorded for inspection.
#[derive(Debug, Clone)]
pub struct MockAgentProvider {
    name: String,
    run: AgentRun,
    failure: Option<String>,
    calls: Arc<Mutex<Vec<(String, TraceContext)>>>,
}

impl MockAgentProvider {
    pub fn new(run: AgentRun) -> Self {
        Self {
            name: "mock-agent".to_string(),
            run,
            failure: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Agent whose log is a single assistant message carrying the answer.
    pub fn answering(answer: impl Into<String>) -> Self {
        let answer = answer.into();
        Self::new(fixtures::agent_run(&answer))
    }

    /// Make every invocation fail with `reason`.
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    /// Instructions and trace contexts seen so far, oldest first.
    pub fn calls(&self) -> Vec<(String, TraceContext)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl AgentProvider for MockAgentProvider {
    async fn go(&self, instruction: &str, trace: &TraceContext) -> DistillResult<AgentRun> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((instruction.to_string(), trace.clone()));
        }
        match &self.failure {
            Some(reason) => Err(AgentError::InvocationFailed {
                agent: self.name.clone(),
                reason: reason.clone(),
            }
            .into()),
            None => Ok(self.run.clone()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Factory handing out one shared [`MockAgentProvider`].
///
/// The first `failing_connects` connection attempts fail; every attempt is
/// counted as soon as it starts.
#[derive(Debug)]
pub struct MockAgentFactory {
    provider: MockAgentProvider,
    remaining_failures: AtomicU32,
    connects: AtomicU32,
    delay: Duration,
}

impl MockAgentFactory {
    pub fn new(provider: MockAgentProvider) -> Self {
        Self {
            provider,
            remaining_failures: AtomicU32::new(0),
            connects: AtomicU32::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn answering(answer: impl Into<String>) -> Self {
        Self::new(MockAgentProvider::answering(answer))
    }

    /// Fail the next `count` connection attempts.
    pub fn failing_connects(self, count: u32) -> Self {
        self.remaining_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Make every connection attempt take `delay`.
    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    /// The provider every successful connect returns.
    pub fn provider(&self) -> &MockAgentProvider {
        &self.provider
    }
}

#[async_trait]
impl AgentFactory for MockAgentFactory {
    async fn connect(&self) -> DistillResult<Arc<dyn AgentProvider>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let failed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(AgentError::InitializationFailed {
                agent: self.provider.name.clone(),
                reason: "connection refused".to_string(),
            }
            .into());
        }
        Ok(Arc::new(self.provider.clone()))
    }

    fn agent_name(&self) -> &str {
        &self.provider.name
    }
}

// ============================================================================
// MOCK TRACING SERVICE
// ============================================================================

/// What [`MockTraceService::fetch_trace`] answers with.
#[derive(Debug, Clone)]
enum FetchBehavior {
    /// Serve the template with its `id` replaced by the requested trace id.
    Document(Value),
    NotFound,
    Fail { status: u16 },
}

/// In-memory tracing service acting as both [`TraceSource`] and
/// [`TraceSink`].
///
/// Trace ids are minted by the service under test, so fetches answer with
/// a template document stamped with whatever id was asked for.
#[derive(Debug, Clone)]
pub struct MockTraceService {
    behavior: FetchBehavior,
    /// Not-found answers to give before the configured behavior applies.
    not_found_first: Arc<AtomicU32>,
    fetches: Arc<AtomicU32>,
    updates: Arc<Mutex<Vec<(TraceId, TraceUpdate)>>>,
}

impl MockTraceService {
    fn with_behavior(behavior: FetchBehavior) -> Self {
        Self {
            behavior,
            not_found_first: Arc::new(AtomicU32::new(0)),
            fetches: Arc::new(AtomicU32::new(0)),
            updates: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Serve `template` for every trace id.
    pub fn serving(template: Value) -> Self {
        Self::with_behavior(FetchBehavior::Document(template))
    }

    /// Report every trace as unknown.
    pub fn empty() -> Self {
        Self::with_behavior(FetchBehavior::NotFound)
    }

    /// Fail every fetch with an HTTP status.
    pub fn failing(status: u16) -> Self {
        Self::with_behavior(FetchBehavior::Fail { status })
    }

    /// Answer not-found for the first `count` fetches.
    pub fn ingesting_after(self, count: u32) -> Self {
        self.not_found_first.store(count, Ordering::SeqCst);
        self
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Updates received so far, oldest first.
    pub fn updates(&self) -> Vec<(TraceId, TraceUpdate)> {
        self.updates.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TraceSource for MockTraceService {
    async fn fetch_trace(&self, trace_id: &TraceId) -> DistillResult<Value> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let pending = self
            .not_found_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if pending {
            return Err(TraceError::NotFound {
                trace_id: trace_id.to_string(),
            }
            .into());
        }

        match &self.behavior {
            FetchBehavior::Document(template) => {
                let mut doc = template.clone();
                if let Some(obj) = doc.as_object_mut() {
                    obj.insert("id".to_string(), Value::String(trace_id.to_string()));
                }
                Ok(doc)
            }
            FetchBehavior::NotFound => Err(TraceError::NotFound {
                trace_id: trace_id.to_string(),
            }
            .into()),
            FetchBehavior::Fail { status } => Err(TraceError::RequestFailed {
                status: *status,
                message: "mock tracing service failure".to_string(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl TraceSink for MockTraceService {
    async fn update_trace(&self, trace_id: &TraceId, update: TraceUpdate) -> DistillResult<()> {
        let mut updates = self.updates.lock().map_err(|_| TraceError::ReportFailed {
            trace_id: trace_id.to_string(),
            reason: "mock lock poisoned".to_string(),
        })?;
        updates.push((trace_id.clone(), update));
        Ok(())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for agent output and trace documents.

    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    /// Instructions as a user might type them, never blank.
    pub fn arb_instruction() -> impl Strategy<Value = String> {
        "[A-Za-z0-9?]{1,12}( [A-Za-z0-9?]{1,12}){0,6}"
    }

    /// Message text, sometimes wrapped in reasoning or solution tags.
    pub fn arb_content() -> impl Strategy<Value = String> {
        ("[a-z ]{0,16}", 0u8..4).prop_map(|(body, wrap)| match wrap {
            1 => format!("<think>{}</think>", body),
            2 => format!("<solution>{}</solution>", body),
            _ => body,
        })
    }

    pub fn arb_log_type() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            4 => Just("ai"),
            2 => Just("tool"),
            1 => Just("human"),
            1 => Just("system"),
        ]
    }

    /// One framework-serialized log entry.
    pub fn arb_log_entry() -> impl Strategy<Value = Value> {
        (arb_log_type(), arb_content()).prop_map(|(kind, content)| {
            json!({"type": kind, "content": content})
        })
    }

    /// A complete agent run whose answer is its last assistant entry, or a
    /// fresh string when the log has none.
    pub fn arb_agent_run() -> impl Strategy<Value = AgentRun> {
        (prop::collection::vec(arb_log_entry(), 0..10), "[a-z0-9]{1,8}").prop_map(
            |(log, fallback)| {
                let final_answer = log
                    .iter()
                    .rev()
                    .find(|e| e["type"] == "ai")
                    .and_then(|e| e["content"].as_str())
                    .filter(|c| !c.trim().is_empty())
                    .map(str::to_string)
                    .unwrap_or(fallback);
                AgentRun { log, final_answer }
            },
        )
    }

    pub fn arb_observation_kind() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            4 => Just("GENERATION"),
            2 => Just("SPAN"),
            1 => Just("EVENT"),
        ]
    }

    /// Trace documents as the tracing service returns them, with parents
    /// drawn among earlier observations.
    pub fn arb_trace_value() -> impl Strategy<Value = Value> {
        prop::collection::vec(
            (
                arb_observation_kind(),
                arb_content(),
                0u32..60,
                any::<prop::sample::Index>(),
                any::<bool>(),
            ),
            0..10,
        )
        .prop_map(|nodes| {
            let observations: Vec<Value> = nodes
                .iter()
                .enumerate()
                .map(|(i, (kind, content, second, parent, has_parent))| {
                    let mut obs = json!({
                        "id": format!("obs-{:02}", i),
                        "type": kind,
                        "startTime": format!("2025-01-01T00:00:{:02}Z", second),
                        "output": content,
                    });
                    if *has_parent && i > 0 {
                        obs["parentObservationId"] = json!(format!("obs-{:02}", parent.index(i)));
                    }
                    obs
                })
                .collect();
            json!({"id": "generated", "observations": observations})
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    /// Agent run whose log holds the question and a single answer.
    pub fn agent_run(answer: &str) -> AgentRun {
        AgentRun {
            log: vec![
                json!({"type": "human", "content": "What is 6*7?"}),
                json!({"type": "ai", "content": answer}),
            ],
            final_answer: answer.to_string(),
        }
    }

    /// Agent log of a tool-using run, in the framework's serialized form.
    pub fn tool_agent_log() -> Vec<Value> {
        vec![
            json!({"type": "system", "content": "You are a biomedical research assistant."}),
            json!({"type": "human", "content": "How many rows are in genes.csv?"}),
            json!({"type": "ai", "content": "<think>Count the rows with pandas.</think><execute>len(df)</execute>"}),
            json!({"type": "tool", "content": "<observation>3</observation>"}),
            json!({"type": "ai", "content": "<solution>3</solution>"}),
        ]
    }

    /// Single-generation trace where reasoning precedes the answer `42`.
    pub fn answer_trace() -> Value {
        json!({
            "id": "fixture-trace",
            "name": "Biomni Chat Interaction",
            "input": "What is 6*7?",
            "output": "42",
            "observations": [
                {
                    "id": "gen-1",
                    "type": "GENERATION",
                    "name": "ChatModel",
                    "startTime": "2025-01-01T00:00:01Z",
                    "input": [
                        {"role": "system", "content": "You are a calculator."},
                        {"role": "user", "content": "What is 6*7?"}
                    ],
                    "output": {"role": "assistant", "content": "<think>6 times 7</think>42"}
                }
            ]
        })
    }

    /// Trace with a container span, a thought, a tool call and an answer.
    pub fn tool_trace() -> Value {
        json!({
            "id": "fixture-trace",
            "name": "Biomni Chat Interaction",
            "observations": [
                {"id": "root", "type": "SPAN", "name": "LangGraph",
                 "startTime": "2025-01-01T00:00:00Z", "output": {"messages": []}},
                {"id": "gen-1", "type": "GENERATION", "parentObservationId": "root",
                 "startTime": "2025-01-01T00:00:01Z",
                 "output": {"role": "assistant", "content": "<think>Count the rows.</think>"}},
                {"id": "exec", "type": "SPAN", "name": "execute", "parentObservationId": "root",
                 "startTime": "2025-01-01T00:00:02Z", "output": "rows=3"},
                {"id": "gen-2", "type": "GENERATION", "parentObservationId": "root",
                 "startTime": "2025-01-01T00:00:03Z",
                 "output": {"role": "assistant", "content": "3"}}
            ]
        })
    }

    pub fn trace_document(value: Value) -> TraceDocument {
        match serde_json::from_value(value) {
            Ok(doc) => doc,
            Err(e) => panic!("fixture trace must parse: {}", e),
        }
    }

    /// Raw record as the chat pipeline would persist it.
    pub fn raw_record(trace_id: &str) -> RawRecord {
        let run = agent_run("42");
        RawRecord {
            trace_id: TraceId::from_string(trace_id),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap_or_else(Utc::now),
            instruction: "What is 6*7?".to_string(),
            langfuse_full_trace: Some(answer_trace()),
            response_log: run.log,
            final_answer: run.final_answer,
        }
    }

    pub fn refined_transcript(trace_id: &str) -> RefinedTranscript {
        RefinedTranscript {
            trace_id: TraceId::from_string(trace_id),
            final_answer: "42".to_string(),
            messages: vec![
                Message::system("You are a calculator."),
                Message::human("What is 6*7?"),
                Message::ai("<think>\n6 times 7\n</think>"),
                Message::ai("42"),
            ],
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for DISTILL-specific validation.

    use super::*;

    /// Assert that a DistillResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &DistillResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a DistillResult is Err.
    #[track_caller]
    pub fn assert_err<T: std::fmt::Debug>(result: &DistillResult<T>) {
        assert!(result.is_err(), "Expected Err, got Ok: {:?}", result);
    }

    #[track_caller]
    pub fn assert_agent_error<T: std::fmt::Debug>(result: &DistillResult<T>) {
        match result {
            Err(DistillError::Agent(_)) => {}
            other => panic!("Expected Agent error, got: {:?}", other),
        }
    }

    /// Assert that a DistillResult is a trace NotFound error for `trace_id`.
    #[track_caller]
    pub fn assert_trace_not_found<T: std::fmt::Debug>(result: &DistillResult<T>, trace_id: &TraceId) {
        match result {
            Err(DistillError::Trace(TraceError::NotFound { trace_id: id })) => {
                assert_eq!(id, trace_id.as_str(), "Wrong trace id in NotFound error");
            }
            other => panic!("Expected trace NotFound for {}, got: {:?}", trace_id, other),
        }
    }

    /// Assert that a DistillResult is a storage NotFound error of `kind`.
    #[track_caller]
    pub fn assert_record_not_found<T: std::fmt::Debug>(result: &DistillResult<T>, kind: &str) {
        match result {
            Err(DistillError::Storage(StorageError::NotFound { kind: k, .. })) => {
                assert_eq!(k, kind, "Wrong record kind in NotFound error");
            }
            other => panic!("Expected {} NotFound, got: {:?}", kind, other),
        }
    }

    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &DistillResult<T>) {
        match result {
            Err(DistillError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    /// Assert that a transcript opens with system then human and ends with
    /// an assistant message carrying `answer`.
    #[track_caller]
    pub fn assert_transcript_shape(messages: &[Message], answer: &str) {
        assert!(messages.len() >= 2, "Transcript too short: {:?}", messages);
        assert_eq!(messages[0].role, Role::System, "First message must be system");
        assert_eq!(messages[1].role, Role::Human, "Second message must be human");
        if let Some(last) = messages.last().filter(|_| messages.len() > 2) {
            assert_eq!(last.role, Role::Ai, "Last message must be the answer");
            assert_eq!(last.content, answer, "Last message must carry the final answer");
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::assertions::*;
    use super::*;

    #[tokio::test]
    async fn test_mock_agent_records_calls() {
        let agent = MockAgentProvider::answering("42");
        let ctx = TraceContext::new(TraceId::from_string("t1"), "chat");
        let run = agent.go("What is 6*7?", &ctx).await;
        assert_eq!(run.map(|r| r.final_answer), Ok("42".to_string()));
        assert_eq!(agent.calls(), vec![("What is 6*7?".to_string(), ctx)]);
    }

    #[tokio::test]
    async fn test_mock_agent_failure() {
        let agent = MockAgentProvider::answering("42").failing("out of memory");
        let ctx = TraceContext::new(TraceId::from_string("t1"), "chat");
        assert_agent_error(&agent.go("Q", &ctx).await);
        assert_eq!(agent.call_count(), 1);
    }

    #[tokio::test]
    async fn test_factory_fails_then_connects() {
        let factory = MockAgentFactory::answering("42").failing_connects(2);
        assert_agent_error(&factory.connect().await.map(|_| ()));
        assert_agent_error(&factory.connect().await.map(|_| ()));
        assert_ok(&factory.connect().await.map(|_| ()));
        assert_eq!(factory.connect_count(), 3);
    }

    #[tokio::test]
    async fn test_trace_service_stamps_requested_id() {
        let service = MockTraceService::serving(fixtures::answer_trace()).ingesting_after(1);
        let id = TraceId::from_string("abc123");

        assert_trace_not_found(&service.fetch_trace(&id).await, &id);
        let doc = service.fetch_trace(&id).await.expect("served after ingest");
        assert_eq!(doc["id"], "abc123");
        assert_eq!(service.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_trace_service_records_updates() {
        let service = MockTraceService::failing(500);
        let id = TraceId::from_string("t1");
        assert_err(&service.fetch_trace(&id).await);

        let update = TraceUpdate::failed("chat", "Q", "boom");
        service.update_trace(&id, update.clone()).await.expect("records");
        assert_eq!(service.updates(), vec![(id, update)]);
    }

    #[test]
    fn test_fixtures_parse() {
        let doc = fixtures::trace_document(fixtures::tool_trace());
        assert_eq!(doc.observations.len(), 4);
        assert_transcript_shape(&fixtures::refined_transcript("t").messages, "42");
    }
}
