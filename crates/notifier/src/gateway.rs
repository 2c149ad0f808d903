//! Client side of the notification read/ack API.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

use cellarwatch_core::{PendingNotification, RestockEventId};

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection refused, DNS, timeout.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend response could not be decoded: {0}")]
    Decode(String),
}

/// Pending-notification source and acknowledgment sink.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn fetch_pending(&self) -> Result<Vec<PendingNotification>, GatewayError>;

    async fn ack(&self, event_ids: &[RestockEventId]) -> Result<(), GatewayError>;
}

/// HTTP client for the API's `/api/v1/watches/notifications` endpoints.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

fn transport(e: reqwest::Error) -> GatewayError {
    if e.is_decode() {
        GatewayError::Decode(e.to_string())
    } else {
        GatewayError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl NotificationGateway for BackendClient {
    async fn fetch_pending(&self) -> Result<Vec<PendingNotification>, GatewayError> {
        let response = self
            .client
            .get(self.url("/watches/notifications"))
            .send()
            .await
            .map_err(transport)?;
        Self::check(response).await?.json().await.map_err(transport)
    }

    async fn ack(&self, event_ids: &[RestockEventId]) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.url("/watches/notifications/ack"))
            .json(&json!({ "event_ids": event_ids }))
            .send()
            .await
            .map_err(transport)?;
        Self::check(response).await?;
        Ok(())
    }
}
