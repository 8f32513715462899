//! Agent service HTTP client with request timeout

use super::types::AgentErrorBody;
use crate::providers::{invalid_response, normalize_base_url, request_failed};
use distill_core::DistillResult;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

const PROVIDER: &str = "agent";

/// HTTP client for the reasoning agent service.
#[derive(Clone)]
pub struct AgentClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl AgentClient {
    /// Create a new agent client.
    ///
    /// # Arguments
    /// * `base_url` - Root URL of the agent service (e.g. `http://localhost:8500`)
    /// * `timeout` - Upper bound for one request, agent run included
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> DistillResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| request_failed(PROVIDER, 0, format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: normalize_base_url(base_url.as_ref()),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST a JSON body and decode the JSON reply.
    pub async fn post<Req: Serialize, Res: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Req,
    ) -> DistillResult<Res> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| request_failed(PROVIDER, 0, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| invalid_response(PROVIDER, format!("Failed to parse response: {}", e)))
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let error_msg = match serde_json::from_str::<AgentErrorBody>(&error_text) {
                Ok(body) => body.detail,
                Err(_) => error_text,
            };
            Err(request_failed(PROVIDER, status.as_u16(), error_msg))
        }
    }

    /// GET an endpoint within `timeout` and require a success status.
    pub async fn probe(&self, endpoint: &str, timeout: Duration) -> DistillResult<()> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| request_failed(PROVIDER, 0, format!("HTTP request failed: {}", e)))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(request_failed(
                PROVIDER,
                status.as_u16(),
                format!("{} answered {}", endpoint, status),
            ))
        }
    }
}

impl std::fmt::Debug for AgentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}
