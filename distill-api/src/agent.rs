//! Reasoning agent handle
//!
//! The agent is connected lazily and at most once at a time: connection
//! attempts are serialized behind an async init guard, so concurrent first
//! requests wait for that single attempt instead of racing their own. The
//! connection state sits behind its own short-lived lock, which keeps
//! status reads answering while an attempt is in flight. A failed attempt
//! is remembered and retried by the next caller.

use distill_core::{AgentError, DistillResult};
use distill_llm::{AgentFactory, AgentProvider};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;

/// Connection state of the agent.
enum AgentState {
    Uninitialized,
    Ready(Arc<dyn AgentProvider>),
    Failed { reason: String },
}

/// Snapshot of [`AgentHandle`] state for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AgentStatus {
    Uninitialized,
    Ready,
    Failed { reason: String },
}

/// Shared, lazily connected agent.
pub struct AgentHandle {
    factory: Arc<dyn AgentFactory>,
    /// Held for the whole duration of a connection attempt.
    init: Mutex<()>,
    /// Never held across an await point.
    state: RwLock<AgentState>,
}

impl AgentHandle {
    pub fn new(factory: Arc<dyn AgentFactory>) -> Self {
        Self {
            factory,
            init: Mutex::new(()),
            state: RwLock::new(AgentState::Uninitialized),
        }
    }

    pub fn agent_name(&self) -> &str {
        self.factory.agent_name()
    }

    // The state is a plain enum replaced wholesale, so a poisoned lock
    // still holds a consistent value.
    fn read_state(&self) -> RwLockReadGuard<'_, AgentState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, AgentState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn ready_agent(&self) -> Option<Arc<dyn AgentProvider>> {
        match &*self.read_state() {
            AgentState::Ready(agent) => Some(agent.clone()),
            _ => None,
        }
    }

    /// Return the connected agent, connecting first if needed.
    ///
    /// # Errors
    /// `AgentError::NotInitialized` carrying the factory's failure reason.
    pub async fn get(&self) -> DistillResult<Arc<dyn AgentProvider>> {
        if let Some(agent) = self.ready_agent() {
            return Ok(agent);
        }

        let _init = self.init.lock().await;
        // Another caller may have connected while we waited.
        if let Some(agent) = self.ready_agent() {
            return Ok(agent);
        }

        let previous_error = match &*self.read_state() {
            AgentState::Failed { reason } => Some(reason.clone()),
            _ => None,
        };
        if let Some(reason) = previous_error {
            tracing::info!(
                agent = self.agent_name(),
                previous_error = %reason,
                "Retrying agent initialization"
            );
        }

        match self.factory.connect().await {
            Ok(agent) => {
                tracing::info!(agent = agent.name(), "Agent initialized");
                *self.write_state() = AgentState::Ready(agent.clone());
                Ok(agent)
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::error!(agent = self.agent_name(), error = %reason, "Agent initialization failed");
                *self.write_state() = AgentState::Failed {
                    reason: reason.clone(),
                };
                Err(AgentError::NotInitialized { reason }.into())
            }
        }
    }

    /// Connect eagerly at startup. A failure is logged and left for the
    /// first request to retry.
    pub async fn warm_up(&self) {
        let _ = self.get().await;
    }

    /// Outcome of the last finished connection attempt. Does not wait for
    /// an attempt in flight.
    pub async fn status(&self) -> AgentStatus {
        match &*self.read_state() {
            AgentState::Uninitialized => AgentStatus::Uninitialized,
            AgentState::Ready(_) => AgentStatus::Ready,
            AgentState::Failed { reason } => AgentStatus::Failed {
                reason: reason.clone(),
            },
        }
    }
}

impl std::fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentHandle")
            .field("agent", &self.agent_name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distill_core::DistillError;
    use distill_test_utils::MockAgentFactory;
    use std::time::Duration;

    #[tokio::test]
    async fn test_lazy_connect_once() {
        let factory = Arc::new(MockAgentFactory::answering("42"));
        let handle = AgentHandle::new(factory.clone());
        assert_eq!(handle.status().await, AgentStatus::Uninitialized);

        handle.get().await.expect("connects");
        handle.get().await.expect("reuses");
        assert_eq!(handle.status().await, AgentStatus::Ready);
        assert_eq!(factory.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_init_is_retried() {
        let factory = Arc::new(MockAgentFactory::answering("42").failing_connects(1));
        let handle = AgentHandle::new(factory.clone());

        let first = handle.get().await;
        assert!(matches!(
            first,
            Err(DistillError::Agent(AgentError::NotInitialized { .. }))
        ));
        assert!(matches!(handle.status().await, AgentStatus::Failed { .. }));

        handle.get().await.expect("second attempt connects");
        assert_eq!(handle.status().await, AgentStatus::Ready);
        assert_eq!(factory.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_first_requests_share_one_connect() {
        let factory = Arc::new(MockAgentFactory::answering("42"));
        let handle = Arc::new(AgentHandle::new(factory.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.get().await.is_ok() })
            })
            .collect();
        for task in tasks {
            assert!(task.await.expect("task joins"));
        }
        assert_eq!(factory.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_status_answers_while_connect_in_flight() {
        let factory = Arc::new(
            MockAgentFactory::answering("42").connect_delay(Duration::from_secs(5)),
        );
        let handle = Arc::new(AgentHandle::new(factory.clone()));

        let first = tokio::spawn({
            let handle = handle.clone();
            async move { handle.get().await.is_ok() }
        });
        while factory.connect_count() == 0 {
            tokio::task::yield_now().await;
        }

        let status = tokio::time::timeout(Duration::from_millis(500), handle.status())
            .await
            .expect("status does not wait for the connect");
        assert_eq!(status, AgentStatus::Uninitialized);
        first.abort();
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(AgentStatus::Failed {
            reason: "down".to_string(),
        })
        .expect("serializes");
        assert_eq!(json, serde_json::json!({"state": "failed", "reason": "down"}));
    }
}
