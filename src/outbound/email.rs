use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use super::TransportError;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), TransportError>;
}

/// Hands messages to a transactional mail API.
#[derive(Debug, Clone)]
pub struct HttpMail {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl HttpMail {
    pub fn new(endpoint: String, api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            from,
        }
    }
}

#[derive(Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

#[async_trait]
impl MailTransport for HttpMail {
    async fn send(&self, message: &EmailMessage) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&OutgoingMail {
                from: &self.from,
                to: &message.to,
                subject: &message.subject,
                text: &message.text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogMail;

#[async_trait]
impl MailTransport for LogMail {
    async fn send(&self, message: &EmailMessage) -> Result<(), TransportError> {
        info!(to = %message.to, subject = %message.subject, "mail API not configured, email logged only");
        Ok(())
    }
}
