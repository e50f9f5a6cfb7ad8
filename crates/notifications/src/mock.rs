//! Mock Notification Service Implementation
//!
//! Stores events in memory for test assertions.
//! Thread-safe via `Arc<Mutex<>>`.

use crate::{NotificationError, NotificationEvent, NotificationKind, NotificationService};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Mock notification service that records events for test assertions.
#[derive(Debug, Clone)]
pub struct MockNotificationService {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
    fail: bool,
}

impl MockNotificationService {
    /// Create a new mock notification service.
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// Create a mock that rejects every delivery.
    pub fn new_failing() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    /// Return all recorded events.
    pub fn recorded_events(&self) -> Vec<NotificationEvent> {
        self.events
            .lock()
            .expect("events lock poisoned by a prior panic")
            .clone()
    }

    /// Return recorded events of one kind for one invitation.
    pub fn events_for(&self, invitation_id: Uuid, kind: NotificationKind) -> Vec<NotificationEvent> {
        self.recorded_events()
            .into_iter()
            .filter(|e| e.invitation_id == invitation_id && e.event == kind)
            .collect()
    }

    /// Clear all recorded events.
    pub fn reset(&self) {
        self.events
            .lock()
            .expect("events lock poisoned by a prior panic")
            .clear();
    }
}

impl Default for MockNotificationService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl NotificationService for MockNotificationService {
    async fn send_events(&self, events: Vec<NotificationEvent>) -> Result<(), NotificationError> {
        if self.fail {
            return Err(NotificationError::Request(
                "mock notification delivery failure".to_string(),
            ));
        }

        tracing::debug!(count = events.len(), "Mock notifications: recording events");
        let mut stored = self
            .events
            .lock()
            .map_err(|e| NotificationError::Request(format!("events lock poisoned: {e}")))?;
        stored.extend(events);
        Ok(())
    }
}
