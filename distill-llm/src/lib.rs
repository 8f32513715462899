//! DISTILL LLM - Agent and Tracing Adapters
//!
//! Provider-agnostic traits for the two external collaborators of a chat
//! request: the reasoning agent that answers it, and the tracing service
//! that records what the agent did. Concrete HTTP implementations live in
//! [`providers`].

pub mod providers;

use async_trait::async_trait;
use distill_core::{AgentRun, DistillError, DistillResult, TraceError, TraceId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

pub use providers::{HttpAgentFactory, HttpAgentProvider, LangfuseClient, LangfuseCredentials};

// ============================================================================
// AGENT PROVIDER
// ============================================================================

/// Tracing context handed to the agent so its sub-operations land in the
/// trace the service will later fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: TraceId,
    /// Human-readable trace name shown by the tracing service.
    pub name: String,
}

impl TraceContext {
    pub fn new(trace_id: TraceId, name: impl Into<String>) -> Self {
        Self {
            trace_id,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for TraceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.trace_id)
    }
}

/// A ready reasoning agent.
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait AgentProvider: Send + Sync {
    /// Run the agent on one instruction.
    ///
    /// # Returns
    /// * `Ok(AgentRun)` - The raw execution log and the final answer
    /// * `Err(DistillError::Agent)` - If the agent failed while running
    async fn go(&self, instruction: &str, trace: &TraceContext) -> DistillResult<AgentRun>;

    /// Identifier used in logs and error messages.
    fn name(&self) -> &str;
}

/// Initialization step for an agent. Connecting may fail; the caller
/// decides when to retry.
#[async_trait]
pub trait AgentFactory: Send + Sync {
    async fn connect(&self) -> DistillResult<Arc<dyn AgentProvider>>;

    /// Identifier of the agent this factory produces.
    fn agent_name(&self) -> &str;
}

// ============================================================================
// TRACING SERVICE
// ============================================================================

/// Fields to upsert on a trace after the agent returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    /// Set when the invocation failed; the trace is tagged as an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TraceUpdate {
    /// Update for a successful run.
    pub fn completed(name: &str, instruction: &str, run: &AgentRun) -> Self {
        let mut metadata = Map::new();
        metadata.insert("full_log_length".to_string(), Value::from(run.log.len()));
        Self {
            name: Some(name.to_string()),
            input: Some(Value::String(instruction.to_string())),
            output: Some(Value::String(run.final_answer.clone())),
            metadata,
            error: None,
        }
    }

    /// Update for a failed run.
    pub fn failed(name: &str, instruction: &str, reason: impl Into<String>) -> Self {
        Self {
            name: Some(name.to_string()),
            input: Some(Value::String(instruction.to_string())),
            output: None,
            metadata: Map::new(),
            error: Some(reason.into()),
        }
    }
}

/// Read access to recorded traces.
#[async_trait]
pub trait TraceSource: Send + Sync {
    /// Fetch the full trace document, exactly as the service returns it.
    ///
    /// # Returns
    /// * `Err(TraceError::NotFound)` - The service does not (yet) know the id
    async fn fetch_trace(&self, trace_id: &TraceId) -> DistillResult<Value>;
}

/// Write access to recorded traces.
#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn update_trace(&self, trace_id: &TraceId, update: TraceUpdate) -> DistillResult<()>;
}

// ============================================================================
// SETTLED FETCH
// ============================================================================

/// How long to wait for the tracing service to ingest a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Delay before the first fetch.
    pub settle: Duration,
    /// Total fetch attempts; at least one is always made.
    pub attempts: u32,
    /// Delay between attempts that came back not-found.
    pub retry_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(3000),
            attempts: 3,
            retry_delay: Duration::from_millis(1500),
        }
    }
}

/// Wait for the trace to settle, then fetch it, polling again while the
/// service reports it as not found. Any other error ends the poll.
pub async fn fetch_trace_settled(
    source: &dyn TraceSource,
    trace_id: &TraceId,
    policy: FetchPolicy,
) -> DistillResult<Value> {
    if !policy.settle.is_zero() {
        tokio::time::sleep(policy.settle).await;
    }

    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match source.fetch_trace(trace_id).await {
            Err(DistillError::Trace(TraceError::NotFound { .. })) if attempt < attempts => {
                tracing::debug!(
                    trace_id = %trace_id,
                    attempt,
                    attempts,
                    "Trace not ingested yet, retrying"
                );
                attempt += 1;
                tokio::time::sleep(policy.retry_delay).await;
            }
            result => return result,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Reports not-found until the given attempt number.
    struct EventuallyFound {
        calls: AtomicU32,
        found_on: u32,
    }

    #[async_trait]
    impl TraceSource for EventuallyFound {
        async fn fetch_trace(&self, trace_id: &TraceId) -> DistillResult<Value> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.found_on {
                Ok(serde_json::json!({"id": trace_id.as_str()}))
            } else {
                Err(TraceError::NotFound {
                    trace_id: trace_id.to_string(),
                }
                .into())
            }
        }
    }

    struct Unauthorized;

    #[async_trait]
    impl TraceSource for Unauthorized {
        async fn fetch_trace(&self, _trace_id: &TraceId) -> DistillResult<Value> {
            Err(TraceError::RequestFailed {
                status: 401,
                message: "bad key".to_string(),
            }
            .into())
        }
    }

    fn quick(attempts: u32) -> FetchPolicy {
        FetchPolicy {
            settle: Duration::ZERO,
            attempts,
            retry_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_fetch_retries_not_found() {
        let source = EventuallyFound {
            calls: AtomicU32::new(0),
            found_on: 3,
        };
        let id = TraceId::from_string("abc");
        let doc = fetch_trace_settled(&source, &id, quick(3)).await;
        assert_eq!(doc, Ok(serde_json::json!({"id": "abc"})));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_attempts() {
        let source = EventuallyFound {
            calls: AtomicU32::new(0),
            found_on: 10,
        };
        let id = TraceId::from_string("abc");
        let result = fetch_trace_settled(&source, &id, quick(2)).await;
        assert!(matches!(
            result,
            Err(DistillError::Trace(TraceError::NotFound { .. }))
        ));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_zero_attempts_still_tries_once() {
        let source = EventuallyFound {
            calls: AtomicU32::new(0),
            found_on: 1,
        };
        let id = TraceId::from_string("abc");
        assert!(fetch_trace_settled(&source, &id, quick(0)).await.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_other_errors_are_not_retried() {
        let id = TraceId::from_string("abc");
        let result = fetch_trace_settled(&Unauthorized, &id, quick(5)).await;
        assert!(matches!(
            result,
            Err(DistillError::Trace(TraceError::RequestFailed { status: 401, .. }))
        ));
    }

    #[test]
    fn test_trace_update_shapes() {
        let run = AgentRun {
            log: vec![Value::Null, Value::Null],
            final_answer: "42".to_string(),
        };
        let done = TraceUpdate::completed("chat", "Q", &run);
        assert_eq!(done.output, Some(Value::String("42".to_string())));
        assert_eq!(done.metadata.get("full_log_length"), Some(&Value::from(2)));
        assert!(done.error.is_none());

        let failed = TraceUpdate::failed("chat", "Q", "boom");
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert!(failed.output.is_none());
    }
}
