use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::info;

use super::TransportError;

/// What the client receives on its private channel.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PushPayload {
    pub id: i32,
    pub title: String,
    pub body: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: NaiveDateTime,
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn push(&self, user_id: i32, payload: &PushPayload) -> Result<(), TransportError>;
}

pub fn user_channel(user_id: i32) -> String {
    format!("private-user-{user_id}")
}

/// Posts events to an HTTP push gateway.
#[derive(Debug, Clone)]
pub struct HttpPush {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpPush {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl PushTransport for HttpPush {
    async fn push(&self, user_id: i32, payload: &PushPayload) -> Result<(), TransportError> {
        let body = serde_json::to_vec(&json!({
            "channel": user_channel(user_id),
            "event": "notification",
            "data": payload,
        }))?;
        let digest = hex::encode(Sha256::digest(&body));

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("x-content-sha256", digest)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Used when no push gateway is configured.
#[derive(Debug, Clone, Default)]
pub struct LogPush;

#[async_trait]
impl PushTransport for LogPush {
    async fn push(&self, user_id: i32, payload: &PushPayload) -> Result<(), TransportError> {
        info!(
            channel = %user_channel(user_id),
            id = payload.id,
            kind = %payload.kind,
            title = %payload.title,
            "push gateway not configured, notification logged only"
        );
        Ok(())
    }
}
