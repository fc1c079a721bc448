//! HTTP client for the remote approval and execution service.
//!
//! Implements both backend seams of `actiondeck-action` against the
//! service's REST API. Failures are mapped to [`BackendError`] and returned
//! as-is; nothing here retries. A `409 Conflict` means the service refused
//! the request in its current state and surfaces as
//! [`BackendError::Rejected`].

use std::time::Duration;

use actiondeck_action::backend::{ApprovalBackend, ExecutionBackend};
use actiondeck_action::error::BackendError;
use actiondeck_action::types::{
    ApprovalQueuePage, ApprovalRequest, ExecutionRequest, ExecutionResult,
};
use actiondeck_core::config::BackendConfig;
use actiondeck_core::types::ApprovalStatus;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// Body of the approve/deny endpoints.
#[derive(Debug, Serialize)]
struct DecisionBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    actor: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

/// REST implementation of [`ApprovalBackend`] and [`ExecutionBackend`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

fn network_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Network(format!("request timed out: {}", e))
    } else {
        BackendError::Network(e.to_string())
    }
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(network_error)?;
        let token = config.api_token.trim();
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: (!token.is_empty()).then(|| token.to_string()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send and map non-2xx responses to [`BackendError`].
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let response = self.authorize(request).send().await.map_err(network_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::CONFLICT {
            tracing::info!(body = %body, "Backend rejected request");
            return Err(BackendError::Rejected(body));
        }
        tracing::warn!(status = status.as_u16(), body = %body, "Backend request failed");
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
        let bytes = response.bytes().await.map_err(network_error)?;
        serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn post_decision(
        &self,
        id: Uuid,
        verb: &str,
        body: &DecisionBody<'_>,
    ) -> Result<(), BackendError> {
        let url = self.url(&format!("/approval-flows/{}/{}", id, verb));
        tracing::debug!(%url, "Posting approval decision");
        self.send(self.client.post(url).json(body)).await?;
        Ok(())
    }
}

#[async_trait]
impl ApprovalBackend for HttpBackend {
    async fn submit(&self, request: &ApprovalRequest) -> Result<ApprovalRequest, BackendError> {
        tracing::debug!(tool = %request.tool_name, "Submitting approval request");
        let response = self
            .send(self.client.post(self.url("/approval-flows")).json(request))
            .await?;
        Self::decode(response).await
    }

    async fn fetch_request(&self, id: Uuid) -> Result<ApprovalRequest, BackendError> {
        let response = self
            .send(self.client.get(self.url(&format!("/approval-flows/{}", id))))
            .await?;
        Self::decode(response).await
    }

    async fn fetch_queue(&self, status: ApprovalStatus) -> Result<ApprovalQueuePage, BackendError> {
        let request = self
            .client
            .get(self.url("/approval-flows/queue"))
            .query(&[("status", status.to_string())]);
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    async fn approve(&self, id: Uuid, actor: Option<&str>) -> Result<(), BackendError> {
        self.post_decision(id, "approve", &DecisionBody { actor, reason: None })
            .await
    }

    async fn deny(
        &self,
        id: Uuid,
        actor: Option<&str>,
        reason: Option<&str>,
    ) -> Result<(), BackendError> {
        self.post_decision(id, "deny", &DecisionBody { actor, reason })
            .await
    }
}

#[async_trait]
impl ExecutionBackend for HttpBackend {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, BackendError> {
        tracing::debug!(action_id = %request.action_id, "Executing action remotely");
        let response = self
            .send(self.client.post(self.url("/actions/execute")).json(request))
            .await?;
        Self::decode(response).await
    }
}
