//! Post-commit dispatch
//!
//! State transitions commit first; notifications are handed to a spawned
//! task afterwards. A delivery failure is logged and dropped.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{NotificationEvent, NotificationService};

#[derive(Clone)]
pub struct NotificationDispatcher {
    service: Arc<dyn NotificationService>,
}

impl NotificationDispatcher {
    pub fn new(service: Arc<dyn NotificationService>) -> Self {
        Self { service }
    }

    /// Hand events to the collaborator without waiting for delivery.
    ///
    /// Returns `None` when there is nothing to send. Must be called from
    /// within a tokio runtime.
    pub fn dispatch(&self, events: Vec<NotificationEvent>) -> Option<JoinHandle<()>> {
        if events.is_empty() {
            return None;
        }

        let service = Arc::clone(&self.service);
        Some(tokio::spawn(async move {
            let count = events.len();
            if let Err(e) = service.send_events(events).await {
                tracing::warn!(error = %e, count, "Failed to deliver notifications");
            }
        }))
    }
}
