//! Agent provider and factory backed by [`AgentClient`]

use super::client::AgentClient;
use super::types::{GoRequest, GoResponse};
use crate::{AgentFactory, AgentProvider, TraceContext};
use async_trait::async_trait;
use distill_core::{AgentError, AgentRun, DistillError, DistillResult};
use std::sync::Arc;
use std::time::Duration;

/// Name the remote agent is reported under.
pub const HTTP_AGENT_NAME: &str = "biomni-a1";

/// Default bound on the `/health` check made while connecting.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Connected remote agent.
#[derive(Debug, Clone)]
pub struct HttpAgentProvider {
    client: AgentClient,
    data_path: String,
}

impl HttpAgentProvider {
    /// # Arguments
    /// * `client` - Client pointed at the agent service
    /// * `data_path` - Data directory the agent loads its tools and datasets from
    pub fn new(client: AgentClient, data_path: impl Into<String>) -> Self {
        Self {
            client,
            data_path: data_path.into(),
        }
    }

    pub fn data_path(&self) -> &str {
        &self.data_path
    }
}

#[async_trait]
impl AgentProvider for HttpAgentProvider {
    async fn go(&self, instruction: &str, trace: &TraceContext) -> DistillResult<AgentRun> {
        let request = GoRequest {
            instruction,
            trace_id: trace.trace_id.as_str(),
            trace_name: &trace.name,
            data_path: &self.data_path,
        };

        let response: GoResponse = self.client.post("go", &request).await.map_err(|e| {
            let reason = match e {
                DistillError::Agent(inner) => inner.to_string(),
                other => other.to_string(),
            };
            DistillError::from(AgentError::InvocationFailed {
                agent: HTTP_AGENT_NAME.to_string(),
                reason,
            })
        })?;

        let final_answer = response.answer_text();
        tracing::debug!(
            trace_id = %trace.trace_id,
            log_entries = response.log.len(),
            answer_chars = final_answer.chars().count(),
            "Agent run completed"
        );
        Ok(AgentRun {
            log: response.log,
            final_answer,
        })
    }

    fn name(&self) -> &str {
        HTTP_AGENT_NAME
    }
}

/// Connects to the agent service, checking it is up before handing out a
/// provider.
#[derive(Debug, Clone)]
pub struct HttpAgentFactory {
    base_url: String,
    data_path: String,
    /// Bound on one agent run.
    timeout: Duration,
    health_timeout: Duration,
}

impl HttpAgentFactory {
    pub fn new(base_url: impl Into<String>, data_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            data_path: data_path.into(),
            timeout,
            health_timeout: DEFAULT_HEALTH_TIMEOUT.min(timeout),
        }
    }

    /// Bound the health check separately from agent runs.
    pub fn with_health_timeout(mut self, health_timeout: Duration) -> Self {
        self.health_timeout = health_timeout;
        self
    }
}

#[async_trait]
impl AgentFactory for HttpAgentFactory {
    async fn connect(&self) -> DistillResult<Arc<dyn AgentProvider>> {
        let init_failed = |reason: String| {
            DistillError::from(AgentError::InitializationFailed {
                agent: HTTP_AGENT_NAME.to_string(),
                reason,
            })
        };

        let client = AgentClient::new(&self.base_url, self.timeout)
            .map_err(|e| init_failed(e.to_string()))?;
        client
            .probe("health", self.health_timeout)
            .await
            .map_err(|e| init_failed(e.to_string()))?;

        tracing::info!(
            agent = HTTP_AGENT_NAME,
            base_url = %client.base_url(),
            data_path = %self.data_path,
            "Agent connected"
        );
        Ok(Arc::new(HttpAgentProvider::new(client, self.data_path.clone())))
    }

    fn agent_name(&self) -> &str {
        HTTP_AGENT_NAME
    }
}
