//! Roster Notification Service
//!
//! Delivers invitation lifecycle events to the external notification
//! collaborator (which owns e-mail templates and delivery):
//! - HTTP webhook client for production
//! - Mock service for testing and development
//! - A dispatcher that sends after commit and never blocks the caller

pub mod client;
pub mod dispatcher;
pub mod mock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use dispatcher::NotificationDispatcher;
pub use mock::MockNotificationService;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification configuration error: {0}")]
    Configuration(String),

    #[error("Notification request error: {0}")]
    Request(String),

    #[error("Notification response error: {0}")]
    Response(String),
}

/// Invitation lifecycle event kinds the collaborator understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Invited,
    Accepted,
    Rejected,
    Expired,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::Invited => write!(f, "invited"),
            NotificationKind::Accepted => write!(f, "accepted"),
            NotificationKind::Rejected => write!(f, "rejected"),
            NotificationKind::Expired => write!(f, "expired"),
        }
    }
}

/// A single notification: what happened to which invitation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub event: NotificationKind,
    pub invitation_id: Uuid,
    pub registration_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(
        event: NotificationKind,
        invitation_id: Uuid,
        registration_id: Uuid,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event,
            invitation_id,
            registration_id,
            occurred_at,
        }
    }
}

/// Notification service configuration
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Provider (http, mock)
    pub provider: String,
    /// Webhook receiving event batches
    pub webhook_url: Option<String>,
    /// Request timeout
    pub timeout_secs: u64,
}

impl NotificationConfig {
    /// Create notification config from environment variables
    pub fn from_env() -> Result<Self, NotificationError> {
        dotenvy::dotenv().ok();

        let provider =
            std::env::var("NOTIFICATION_PROVIDER").unwrap_or_else(|_| "mock".to_string());
        let webhook_url = std::env::var("NOTIFICATION_WEBHOOK_URL").ok();
        let timeout_secs = std::env::var("NOTIFICATION_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        if provider == "http" && webhook_url.is_none() {
            return Err(NotificationError::Configuration(
                "NOTIFICATION_WEBHOOK_URL is required for the http provider".to_string(),
            ));
        }

        Ok(Self {
            provider,
            webhook_url,
            timeout_secs,
        })
    }
}

/// Notification service trait for different implementations
#[async_trait::async_trait]
pub trait NotificationService: Send + Sync {
    /// Deliver a batch of events
    async fn send_events(&self, events: Vec<NotificationEvent>) -> Result<(), NotificationError>;
}

/// Factory for creating NotificationService implementations
pub struct NotificationServiceFactory;

impl NotificationServiceFactory {
    /// Create a NotificationService based on configuration
    pub fn create(
        config: NotificationConfig,
    ) -> Result<Box<dyn NotificationService>, NotificationError> {
        match config.provider.as_str() {
            "http" => {
                tracing::info!("Creating HTTP notification client");
                Ok(Box::new(client::HttpNotificationClient::new(config)?))
            }
            "mock" => {
                tracing::info!("Creating mock notification service");
                Ok(Box::new(MockNotificationService::new()))
            }
            provider => Err(NotificationError::Configuration(format!(
                "Unknown notification provider: {}. Supported providers: http, mock",
                provider
            ))),
        }
    }
}
