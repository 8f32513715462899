//! Stored transcript lookup
//!
//! Read-only access to what the chat pipeline persisted for a trace.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use distill_core::{RawRecord, RefinedTranscript, TraceId};
use distill_storage::TranscriptStore;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn parse_trace_id(raw: String) -> ApiResult<TraceId> {
    let valid = !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(TraceId::from_string(raw))
    } else {
        Err(ApiError::invalid_input(format!("Invalid trace id: {:?}", raw)))
    }
}

/// GET /api/transcripts/{trace_id}/raw - Stored raw record
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/transcripts/{trace_id}/raw",
    tag = "Transcripts",
    params(("trace_id" = String, Path, description = "Trace id returned by the tracing service")),
    responses(
        (status = 200, description = "Raw record", content_type = "application/json"),
        (status = 400, description = "Malformed trace id", body = crate::error::ApiError),
        (status = 404, description = "Nothing stored for this trace", body = crate::error::ApiError),
    ),
))]
pub async fn get_raw(
    State(store): State<Arc<dyn TranscriptStore>>,
    Path(trace_id): Path<String>,
) -> ApiResult<Json<RawRecord>> {
    let record = store.load_raw(&parse_trace_id(trace_id)?).await?;
    Ok(Json(record))
}

/// GET /api/transcripts/{trace_id}/refined - Stored refined transcript
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/transcripts/{trace_id}/refined",
    tag = "Transcripts",
    params(("trace_id" = String, Path, description = "Trace id returned by the tracing service")),
    responses(
        (status = 200, description = "Refined transcript", content_type = "application/json"),
        (status = 400, description = "Malformed trace id", body = crate::error::ApiError),
        (status = 404, description = "Nothing stored for this trace", body = crate::error::ApiError),
    ),
))]
pub async fn get_refined(
    State(store): State<Arc<dyn TranscriptStore>>,
    Path(trace_id): Path<String>,
) -> ApiResult<Json<RefinedTranscript>> {
    let transcript = store.load_refined(&parse_trace_id(trace_id)?).await?;
    Ok(Json(transcript))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/transcripts/:trace_id/raw", get(get_raw))
        .route("/transcripts/:trace_id/refined", get(get_refined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_parse_trace_id() {
        assert_eq!(
            parse_trace_id("0190b4c2e5f6".to_string()).map(|id| id.to_string()),
            Ok("0190b4c2e5f6".to_string())
        );
        let err = parse_trace_id("..".to_string()).expect_err("rejected");
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert!(parse_trace_id(String::new()).is_err());
    }
}
