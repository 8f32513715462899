//! Langfuse HTTP client

use super::types::{ApiErrorBody, IngestionBatch, IngestionEvent, IngestionResponse, TraceBody};
use crate::providers::normalize_base_url;
use crate::{TraceSink, TraceSource, TraceUpdate};
use async_trait::async_trait;
use chrono::Utc;
use distill_core::{DistillResult, TraceError, TraceId};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Host and key pair for the Langfuse public API.
#[derive(Clone, PartialEq, Eq)]
pub struct LangfuseCredentials {
    pub host: String,
    pub public_key: String,
    pub secret_key: String,
}

impl LangfuseCredentials {
    pub fn new(
        host: impl AsRef<str>,
        public_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            host: normalize_base_url(host.as_ref()),
            public_key: public_key.into(),
            secret_key: secret_key.into(),
        }
    }
}

impl std::fmt::Debug for LangfuseCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LangfuseCredentials")
            .field("host", &self.host)
            .field("public_key", &self.public_key)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// Langfuse API client, usable both as a [`TraceSource`] and a [`TraceSink`].
#[derive(Clone)]
pub struct LangfuseClient {
    client: Client,
    credentials: LangfuseCredentials,
}

impl LangfuseClient {
    pub fn new(credentials: LangfuseCredentials, timeout: Duration) -> DistillResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TraceError::RequestFailed {
                status: 0,
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            credentials,
        })
    }

    pub fn host(&self) -> &str {
        &self.credentials.host
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/public/{}", self.credentials.host, path)
    }

    async fn error_message(response: Response) -> String {
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        match serde_json::from_str::<ApiErrorBody>(&text) {
            Ok(body) => body.message,
            Err(_) => text,
        }
    }
}

fn transport_error(e: reqwest::Error) -> TraceError {
    TraceError::RequestFailed {
        status: e.status().map(|s| s.as_u16()).unwrap_or(0),
        message: format!("HTTP request failed: {}", e),
    }
}

/// Map an update onto a `trace-create` body. Failures are tagged `error`
/// and carry the level and status message in metadata.
pub(crate) fn trace_body(trace_id: &TraceId, update: TraceUpdate) -> TraceBody {
    let mut metadata = update.metadata;
    let mut tags = Vec::new();
    if let Some(reason) = update.error {
        metadata.insert("level".to_string(), Value::String("ERROR".to_string()));
        metadata.insert("status_message".to_string(), Value::String(reason));
        tags.push("error".to_string());
    }
    TraceBody {
        id: trace_id.to_string(),
        name: update.name,
        input: update.input,
        output: update.output,
        metadata,
        tags,
    }
}

#[async_trait]
impl TraceSource for LangfuseClient {
    async fn fetch_trace(&self, trace_id: &TraceId) -> DistillResult<Value> {
        let response = self
            .client
            .get(self.url(&format!("traces/{}", trace_id)))
            .basic_auth(&self.credentials.public_key, Some(&self.credentials.secret_key))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        match status {
            s if s.is_success() => {
                let doc = response.json::<Value>().await.map_err(|e| TraceError::InvalidDocument {
                    reason: e.to_string(),
                })?;
                tracing::debug!(trace_id = %trace_id, "Fetched trace document");
                Ok(doc)
            }
            StatusCode::NOT_FOUND => Err(TraceError::NotFound {
                trace_id: trace_id.to_string(),
            }
            .into()),
            _ => Err(TraceError::RequestFailed {
                status: status.as_u16(),
                message: Self::error_message(response).await,
            }
            .into()),
        }
    }
}

#[async_trait]
impl TraceSink for LangfuseClient {
    async fn update_trace(&self, trace_id: &TraceId, update: TraceUpdate) -> DistillResult<()> {
        let report_failed = |reason: String| TraceError::ReportFailed {
            trace_id: trace_id.to_string(),
            reason,
        };

        let batch = IngestionBatch {
            batch: vec![IngestionEvent {
                id: Uuid::now_v7().to_string(),
                timestamp: Utc::now().to_rfc3339(),
                kind: "trace-create",
                body: trace_body(trace_id, update),
            }],
        };

        let response = self
            .client
            .post(self.url("ingestion"))
            .basic_auth(&self.credentials.public_key, Some(&self.credentials.secret_key))
            .json(&batch)
            .send()
            .await
            .map_err(|e| report_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = Self::error_message(response).await;
            return Err(report_failed(format!("status {}: {}", status.as_u16(), message)).into());
        }

        // 207 carries per-event results.
        let result: IngestionResponse = response.json().await.unwrap_or_default();
        if let Some(err) = result.errors.first() {
            return Err(report_failed(format!(
                "event {} rejected with status {}: {}",
                err.id,
                err.status,
                err.message.as_deref().unwrap_or("no message")
            ))
            .into());
        }

        tracing::debug!(trace_id = %trace_id, "Trace update ingested");
        Ok(())
    }
}

impl std::fmt::Debug for LangfuseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LangfuseClient")
            .field("host", &self.credentials.host)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_debug_redacts_secret() {
        let creds = LangfuseCredentials::new("https://lf.example/", "pk-lf-1", "sk-lf-secret");
        assert_eq!(creds.host, "https://lf.example");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("sk-lf-secret"));
    }

    #[test]
    fn test_failed_update_is_tagged() {
        let id = TraceId::from_string("t1");
        let body = trace_body(&id, TraceUpdate::failed("chat", "Q", "agent crashed"));
        let value = serde_json::to_value(&body).expect("body serializes");
        assert_eq!(value["id"], json!("t1"));
        assert_eq!(value["tags"], json!(["error"]));
        assert_eq!(value["metadata"]["level"], json!("ERROR"));
        assert_eq!(value["metadata"]["status_message"], json!("agent crashed"));
        assert!(value.get("output").is_none());
    }

    #[test]
    fn test_completed_update_has_no_tags() {
        let id = TraceId::from_string("t1");
        let run = distill_core::AgentRun {
            log: vec![],
            final_answer: "42".to_string(),
        };
        let value = serde_json::to_value(trace_body(&id, TraceUpdate::completed("chat", "Q", &run)))
            .expect("body serializes");
        assert!(value.get("tags").is_none());
        assert_eq!(value["output"], json!("42"));
        assert_eq!(value["metadata"]["full_log_length"], json!(0));
    }
}
