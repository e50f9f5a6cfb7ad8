//! HTTP webhook client
//!
//! POSTs event batches as a JSON array to the configured webhook URL.

use std::time::Duration;

use crate::{NotificationConfig, NotificationError, NotificationEvent, NotificationService};

/// Webhook-backed notification client
pub struct HttpNotificationClient {
    http: reqwest::Client,
    webhook_url: String,
}

impl HttpNotificationClient {
    /// Create a new client from configuration
    pub fn new(config: NotificationConfig) -> Result<Self, NotificationError> {
        let webhook_url = config.webhook_url.ok_or_else(|| {
            NotificationError::Configuration(
                "NOTIFICATION_WEBHOOK_URL is required for the http provider".to_string(),
            )
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NotificationError::Configuration(e.to_string()))?;

        Ok(Self { http, webhook_url })
    }
}

#[async_trait::async_trait]
impl NotificationService for HttpNotificationClient {
    async fn send_events(&self, events: Vec<NotificationEvent>) -> Result<(), NotificationError> {
        if events.is_empty() {
            return Ok(());
        }

        let response = self
            .http
            .post(&self.webhook_url)
            .json(&events)
            .send()
            .await
            .map_err(|e| NotificationError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read response body".to_string());
            return Err(NotificationError::Response(format!(
                "Notification webhook returned {}: {}",
                status, body
            )));
        }

        tracing::debug!(count = events.len(), "Notification events delivered");
        Ok(())
    }
}
