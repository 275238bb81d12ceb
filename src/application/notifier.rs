use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::WebhookConfig;
use crate::domain::Notification;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Outbound message channel. Best-effort, one attempt per message.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Used when no channel is configured: logs and drops the message.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        debug!(phone = %notification.phone, "Notifier not configured, message dropped");
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    messages: WebhookContent<'a>,
    number: &'a str,
    #[serde(rename = "checkIfExists")]
    check_if_exists: bool,
}

#[derive(Serialize)]
struct WebhookContent<'a> {
    content: &'a str,
    #[serde(rename = "mediaUrl", skip_serializing_if = "Option::is_none")]
    media_url: Option<&'a str>,
}

/// Delivers messages through a chat-bot webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookNotifier {
    const TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(config: WebhookConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(Self::TIMEOUT).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = WebhookMessage {
            messages: WebhookContent {
                content: &notification.content,
                media_url: self.config.media_url.as_deref(),
            },
            number: &notification.phone,
            check_if_exists: false,
        };

        let response = self
            .client
            .post(&self.config.url)
            .header("x-api-builderbot", &self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(phone = %notification.phone, "Notification delivered");
        Ok(())
    }
}

/// Fire a notification without waiting for it. Failures are logged only.
pub fn dispatch(notifier: &Arc<dyn Notifier>, notification: Notification) {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        if let Err(e) = notifier.send(&notification).await {
            warn!(phone = %notification.phone, error = %e, "Failed to send notification");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_payload_shape() {
        let payload = WebhookMessage {
            messages: WebhookContent {
                content: "hello",
                media_url: None,
            },
            number: "5492646298880",
            check_if_exists: false,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["messages"]["content"], "hello");
        assert!(json["messages"].get("mediaUrl").is_none());
        assert_eq!(json["number"], "5492646298880");
        assert_eq!(json["checkIfExists"], false);
    }

    #[tokio::test]
    async fn test_disabled_notifier_succeeds() {
        let notifier = DisabledNotifier;
        let result = notifier.send(&Notification::new("123", "hi")).await;
        assert!(result.is_ok());
    }
}
