//! Chat Endpoint
//!
//! `POST /api/chat` forwards the message to the reasoning agent and answers
//! with the agent's final answer and raw log. Along the way each request
//! becomes one dataset sample:
//!
//! 1. the agent runs under a freshly minted trace id
//! 2. the trace is updated with the outcome (error-tagged on failure)
//! 3. once the tracing service has settled, the full trace is fetched
//! 4. the raw record and the refined transcript are persisted
//!
//! Steps 3 and 4 never fail the request. Whatever goes wrong there is
//! logged and the dataset fields are left out of the response.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use distill_core::{
    AgentRun, DistillError, Message, RawRecord, RefinedTranscript, TraceDocument, TraceError,
    TraceId,
};
use distill_flatten::TranscriptSource;
use distill_llm::{fetch_trace_settled, TraceContext, TraceUpdate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::telemetry::metrics;

// ============================================================================
// TYPES
// ============================================================================

/// Chat request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChatRequest {
    /// Instruction for the agent
    pub message: String,
}

/// Chat response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChatResponse {
    /// Final answer of the agent
    pub response: String,

    /// Raw execution log, for visualizing intermediate steps
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub logs: Vec<Value>,

    /// Extracted message records with reasoning delimiters removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Vec<Object>>))]
    pub raw_data: Option<Vec<Message>>,

    /// Refined transcript as persisted for fine-tuning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub refined_data: Option<RefinedTranscript>,
}

/// Dataset fields produced for one request.
#[derive(Debug, Default)]
struct DatasetCapture {
    raw_data: Option<Vec<Message>>,
    refined_data: Option<RefinedTranscript>,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /api/chat - Run the agent on one message
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/chat",
    tag = "Chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Agent answered", body = ChatResponse),
        (status = 400, description = "Empty or malformed message", body = ApiError),
        (status = 500, description = "Agent failed while answering", body = ApiError),
        (status = 503, description = "Agent could not be initialized", body = ApiError),
    ),
))]
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Json<ChatResponse>> {
    let Json(request) = payload.map_err(|rejection| ApiError::invalid_input(rejection.body_text()))?;

    if request.message.trim().is_empty() {
        return Err(ApiError::invalid_input("message must not be empty")
            .with_details(serde_json::json!({"field": "message"})));
    }
    let instruction = request.message;
    tracing::info!(chars = instruction.chars().count(), "Received chat request");

    let agent = match state.agent.get().await {
        Ok(agent) => agent,
        Err(e) => {
            if let Some(m) = metrics() {
                m.record_agent_invocation("init_failed", 0.0);
            }
            return Err(e.into());
        }
    };

    let trace_id = TraceId::new();
    let context = TraceContext::new(trace_id.clone(), state.chat.trace_name.as_str());
    let started = Instant::now();

    let run = match agent.go(&instruction, &context).await {
        Ok(run) => {
            if let Some(m) = metrics() {
                m.record_agent_invocation("success", started.elapsed().as_secs_f64());
            }
            run
        }
        Err(e) => {
            if let Some(m) = metrics() {
                m.record_agent_invocation("failed", started.elapsed().as_secs_f64());
            }
            tracing::error!(trace_id = %trace_id, error = %e, "Error during execution");
            report_trace(
                &state,
                &trace_id,
                TraceUpdate::failed(&state.chat.trace_name, &instruction, e.to_string()),
            )
            .await;
            return Err(e.into());
        }
    };

    report_trace(
        &state,
        &trace_id,
        TraceUpdate::completed(&state.chat.trace_name, &instruction, &run),
    )
    .await;

    let dataset = capture_dataset(&state, &trace_id, &instruction, &run).await;
    let (raw_data, refined_data) = if state.chat.include_dataset {
        (dataset.raw_data, dataset.refined_data)
    } else {
        (None, None)
    };

    Ok(Json(ChatResponse {
        response: run.final_answer,
        logs: run.log,
        raw_data,
        refined_data,
    }))
}

// ============================================================================
// PIPELINE STEPS
// ============================================================================

async fn report_trace(state: &AppState, trace_id: &TraceId, update: TraceUpdate) {
    let Some(traces) = &state.traces else {
        return;
    };
    if let Err(e) = traces.sink.update_trace(trace_id, update).await {
        tracing::warn!(trace_id = %trace_id, error = %e, "Failed to update trace");
    }
}

/// Fetch the settled trace, or `None` when tracing is disabled or the fetch
/// failed.
async fn fetch_trace(state: &AppState, trace_id: &TraceId) -> Option<Value> {
    let Some(traces) = &state.traces else {
        if let Some(m) = metrics() {
            m.record_trace_fetch("disabled");
        }
        return None;
    };

    let result = fetch_trace_settled(traces.source.as_ref(), trace_id, traces.policy).await;
    let outcome = match &result {
        Ok(_) => "found",
        Err(DistillError::Trace(TraceError::NotFound { .. })) => "not_found",
        Err(_) => "error",
    };
    if let Some(m) = metrics() {
        m.record_trace_fetch(outcome);
    }

    match result {
        Ok(doc) => Some(doc),
        Err(e) => {
            tracing::warn!(trace_id = %trace_id, error = %e, "Trace unavailable, falling back");
            None
        }
    }
}

async fn capture_dataset(
    state: &AppState,
    trace_id: &TraceId,
    instruction: &str,
    run: &AgentRun,
) -> DatasetCapture {
    let full_trace = fetch_trace(state, trace_id).await;
    let document: Option<TraceDocument> =
        full_trace
            .as_ref()
            .and_then(|value| match serde_json::from_value(value.clone()) {
                Ok(doc) => Some(doc),
                Err(e) => {
                    tracing::warn!(trace_id = %trace_id, error = %e, "Trace document does not parse");
                    None
                }
            });

    let record = RawRecord {
        trace_id: trace_id.clone(),
        timestamp: Utc::now(),
        instruction: instruction.to_string(),
        langfuse_full_trace: full_trace,
        response_log: run.log.clone(),
        final_answer: run.final_answer.clone(),
    };
    let raw_saved = match state.store.save_raw(&record).await {
        Ok(at) => {
            tracing::debug!(trace_id = %trace_id, stored_at = %at, "Raw record saved");
            true
        }
        Err(e) => {
            tracing::error!(trace_id = %trace_id, error = %e, "Failed to save raw record");
            false
        }
    };
    if let Some(m) = metrics() {
        m.record_transcript_write("raw", raw_saved);
    }

    if state.chat.source == TranscriptSource::Trace && document.is_none() {
        tracing::warn!(trace_id = %trace_id, "No trace to refine, skipping refined transcript");
        return DatasetCapture::default();
    }

    let transcript = state.flattener.flatten(
        state.chat.source,
        document.as_ref(),
        &run.log,
        instruction,
        &run.final_answer,
    );
    let origin = transcript.origin;
    let raw_data = transcript.display_messages();
    let refined = transcript.into_refined(trace_id.clone());

    let refined_saved = match state.store.save_refined(&refined).await {
        Ok(at) => {
            tracing::info!(
                trace_id = %trace_id,
                origin = %origin,
                messages = refined.messages.len(),
                stored_at = %at,
                "Saved raw and refined trace data"
            );
            true
        }
        Err(e) => {
            tracing::error!(trace_id = %trace_id, error = %e, "Failed to save refined transcript");
            false
        }
    };
    if let Some(m) = metrics() {
        m.record_transcript_write("refined", refined_saved);
    }

    DatasetCapture {
        raw_data: raw_saved.then_some(raw_data),
        refined_data: refined_saved.then_some(refined),
    }
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new().route("/chat", post(chat))
}
