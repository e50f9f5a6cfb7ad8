//! Registration services
//!
//! `RegistrationService` owns the injected collaborators (storage, clock,
//! notifier) and exposes every registration and invitation operation. Each
//! operation runs in exactly one unit of work; notifications collected along
//! the way are dispatched only after that unit of work commits.

pub mod coordinator;
pub mod ledger;
pub mod registrations;
pub mod sweeper;
pub mod view;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use roster_common::Clock;
use roster_notifications::{NotificationDispatcher, NotificationEvent, NotificationKind};

use crate::domain::entities::Invitation;
use crate::repository::RegistrationStore;

pub use ledger::SeatLedger;
pub use registrations::RegisterInput;
pub use sweeper::{ExpirySweeper, SweepReport};
pub use view::{InvitationLanding, RegistrationStatusView};

#[derive(Clone)]
pub struct RegistrationService {
    store: Arc<dyn RegistrationStore>,
    clock: Arc<dyn Clock>,
    notifier: NotificationDispatcher,
    invitation_ttl: Duration,
}

impl RegistrationService {
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        clock: Arc<dyn Clock>,
        notifier: NotificationDispatcher,
        invitation_ttl: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            invitation_ttl,
        }
    }

    pub fn invitation_ttl(&self) -> Duration {
        self.invitation_ttl
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Hand post-commit events to the notifier
    fn publish(&self, outbox: Outbox) {
        self.notifier.dispatch(outbox.events);
    }
}

/// Notifications produced inside a unit of work, released after commit
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    events: Vec<NotificationEvent>,
}

impl Outbox {
    pub(crate) fn push(&mut self, kind: NotificationKind, invitation: &Invitation, at: DateTime<Utc>) {
        self.events.push(NotificationEvent::new(
            kind,
            invitation.id,
            invitation.registration_id,
            at,
        ));
    }
}
