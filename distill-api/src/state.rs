//! Shared application state for Axum handlers.

use axum::extract::FromRef;
use std::sync::Arc;
use std::time::Instant;

use distill_core::DistillResult;
use distill_flatten::{Flattener, TranscriptSource};
use distill_llm::{
    FetchPolicy, HttpAgentFactory, LangfuseClient, TraceSink, TraceSource,
};
use distill_storage::{FileTranscriptStore, TranscriptStore};

use crate::agent::AgentHandle;
use crate::config::{AgentConfig, ApiConfig, FlattenSettings, LangfuseConfig, StorageConfig};

/// Read and write access to the tracing service plus the fetch timing.
#[derive(Clone)]
pub struct TraceBackend {
    pub source: Arc<dyn TraceSource>,
    pub sink: Arc<dyn TraceSink>,
    pub policy: FetchPolicy,
}

impl TraceBackend {
    pub fn new(source: Arc<dyn TraceSource>, sink: Arc<dyn TraceSink>, policy: FetchPolicy) -> Self {
        Self {
            source,
            sink,
            policy,
        }
    }

    /// One Langfuse client serving as both source and sink.
    pub fn langfuse(client: LangfuseClient, policy: FetchPolicy) -> Self {
        let client = Arc::new(client);
        Self::new(client.clone(), client, policy)
    }
}

/// Per-request behavior of the chat pipeline.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    /// Trace name reported to the tracing service.
    pub trace_name: String,
    pub source: TranscriptSource,
    /// Whether responses carry `raw_data` and `refined_data`.
    pub include_dataset: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            trace_name: AgentConfig::default().trace_name,
            source: TranscriptSource::default(),
            include_dataset: true,
        }
    }
}

/// Application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<AgentHandle>,
    /// `None` when tracing service credentials are not configured.
    pub traces: Option<TraceBackend>,
    pub store: Arc<dyn TranscriptStore>,
    pub flattener: Arc<Flattener>,
    pub chat: Arc<ChatSettings>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        agent: Arc<AgentHandle>,
        traces: Option<TraceBackend>,
        store: Arc<dyn TranscriptStore>,
        flattener: Arc<Flattener>,
        chat: ChatSettings,
    ) -> Self {
        Self {
            agent,
            traces,
            store,
            flattener,
            chat: Arc::new(chat),
            start_time: Instant::now(),
        }
    }

    /// Wire the production collaborators from configuration.
    pub fn from_config(
        api: &ApiConfig,
        agent: &AgentConfig,
        langfuse: &LangfuseConfig,
        storage: &StorageConfig,
        flatten: FlattenSettings,
    ) -> DistillResult<Self> {
        let factory = HttpAgentFactory::new(&agent.base_url, &agent.data_path, agent.timeout)
            .with_health_timeout(agent.health_timeout);
        let handle = Arc::new(AgentHandle::new(Arc::new(factory)));

        let traces = match langfuse.credentials() {
            Some(credentials) => {
                let client = LangfuseClient::new(credentials, langfuse.timeout)?;
                tracing::info!(host = client.host(), "Tracing service configured");
                Some(TraceBackend::langfuse(client, langfuse.fetch_policy))
            }
            None => {
                tracing::warn!("LANGFUSE_PUBLIC_KEY/LANGFUSE_SECRET_KEY not set, trace capture disabled");
                None
            }
        };

        let store: Arc<dyn TranscriptStore> =
            Arc::new(FileTranscriptStore::new(storage.log_dir.clone()));
        let flattener = Arc::new(Flattener::new(flatten.config)?);

        let chat = ChatSettings {
            trace_name: agent.trace_name.clone(),
            source: flatten.source,
            include_dataset: api.include_dataset,
        };

        Ok(Self::new(handle, traces, store, flattener, chat))
    }
}

// Substates extracted directly by the read-only handlers.

impl FromRef<AppState> for Arc<AgentHandle> {
    fn from_ref(state: &AppState) -> Self {
        state.agent.clone()
    }
}

impl FromRef<AppState> for Arc<dyn TranscriptStore> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Option<TraceBackend> {
    fn from_ref(state: &AppState) -> Self {
        state.traces.clone()
    }
}

impl FromRef<AppState> for Instant {
    fn from_ref(state: &AppState) -> Self {
        state.start_time
    }
}
