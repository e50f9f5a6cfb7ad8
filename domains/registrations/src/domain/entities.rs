//! Domain entities for competition registrations
//!
//! Entities hold their own validation and delegate status changes to the
//! state machines in [`crate::domain::state`]. Cross-entity references are
//! ids only; lookups always go through the storage interface.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use roster_common::StateError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::commands::InvitationAction;
use crate::domain::error::{RegistrationError, Result};
use crate::domain::state::{
    InvitationEvent, InvitationGuardContext, InvitationStateMachine, InvitationStatus,
    RegistrationEvent, RegistrationGuardContext, RegistrationStateMachine, RegistrationStatus,
};
use crate::domain::validation;

/// Entry type chosen at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entry_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Individual,
    Team,
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryType::Individual => write!(f, "individual"),
            EntryType::Team => write!(f, "team"),
        }
    }
}

/// Whether every outstanding invitation on a registration has resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "registration_completeness", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Completeness {
    Complete,
    PendingInvitations,
}

/// Competition capacity record, read from the competition catalog.
///
/// Only `seats_remaining` is ever written by this crate, and only through
/// the seat ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Competition {
    pub id: Uuid,
    pub title: String,
    pub total_seats: i32,
    pub seats_remaining: i32,
    pub max_team_size: i32,
    pub registration_opens_at: Option<DateTime<Utc>>,
    pub registration_closes_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Competition {
    /// Create a competition with every seat available and an unbounded window
    pub fn new(title: impl Into<String>, total_seats: i32, max_team_size: i32) -> Result<Self> {
        let title = title.into();
        if title.trim().is_empty() || title.len() > 200 {
            return Err(RegistrationError::Validation(
                "Competition title must be 1-200 characters".to_string(),
            ));
        }
        if total_seats < 0 {
            return Err(RegistrationError::Validation(
                "Total seats cannot be negative".to_string(),
            ));
        }
        if max_team_size < 1 {
            return Err(RegistrationError::Validation(
                "Max team size must be at least 1".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Competition {
            id: Uuid::new_v4(),
            title,
            total_seats,
            seats_remaining: total_seats,
            max_team_size,
            registration_opens_at: None,
            registration_closes_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Restrict registration to `[opens_at, closes_at)`
    pub fn with_window(
        mut self,
        opens_at: Option<DateTime<Utc>>,
        closes_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.registration_opens_at = opens_at;
        self.registration_closes_at = closes_at;
        self
    }

    /// Check whether `now` falls inside the registration window
    pub fn is_registration_open(&self, now: DateTime<Utc>) -> bool {
        let opened = self.registration_opens_at.map_or(true, |opens| now >= opens);
        let not_closed = self.registration_closes_at.map_or(true, |closes| now < closes);
        opened && not_closed
    }

    /// Seats currently held by active reservations
    pub fn seats_taken(&self) -> i32 {
        self.total_seats - self.seats_remaining
    }
}

/// Public identity of a user, as supplied by the identity provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// A leader's (and optionally teammates') entry into one competition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Registration {
    pub id: Uuid,
    pub competition_id: Uuid,
    pub leader_id: Uuid,
    pub entry_type: EntryType,
    pub team_name: Option<String>,
    /// Seats reserved for this entry; shrinks to the filled size on finalize
    pub declared_size: i32,
    /// Accepted members in join order, leader first
    pub member_ids: Vec<Uuid>,
    pub status: RegistrationStatus,
    pub completeness: Completeness,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    /// Create a pending registration, validating the declared size against
    /// the competition's team size limit.
    pub fn new(
        competition: &Competition,
        leader_id: Uuid,
        entry_type: EntryType,
        team_name: Option<String>,
        declared_size: i32,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        validation::validate_declared_size(entry_type, declared_size, competition.max_team_size)?;
        let team_name = match entry_type {
            EntryType::Team => validation::normalize_team_name(team_name)?,
            EntryType::Individual => None,
        };

        let completeness = match entry_type {
            EntryType::Individual => Completeness::Complete,
            EntryType::Team => Completeness::PendingInvitations,
        };

        Ok(Registration {
            id: Uuid::new_v4(),
            competition_id: competition.id,
            leader_id,
            entry_type,
            team_name,
            declared_size,
            member_ids: vec![leader_id],
            status: RegistrationStatus::Pending,
            completeness,
            created_at: now,
            confirmed_at: None,
            updated_at: now,
        })
    }

    pub fn is_leader(&self, user_id: Uuid) -> bool {
        self.leader_id == user_id
    }

    /// Leader or accepted teammate
    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.member_ids.contains(&user_id)
    }

    /// Filled member slots, leader included
    pub fn filled_size(&self) -> i32 {
        self.member_ids.len() as i32
    }

    /// Accepted teammates, leader excluded
    pub fn accepted_member_count(&self) -> i32 {
        self.filled_size() - 1
    }

    /// Member slots neither filled nor promised to a pending invitation
    pub fn open_slots(&self, pending_invitations: i32) -> i32 {
        (self.declared_size - self.filled_size() - pending_invitations).max(0)
    }

    /// Seats this registration currently holds in the ledger
    pub fn seats_held(&self) -> i32 {
        if self.status.holds_seats() {
            self.declared_size
        } else {
            0
        }
    }

    /// Not withdrawn and not rejected
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Append an accepted invitee to the member list
    pub fn add_member(&mut self, user_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        if self.is_member(user_id) {
            return Err(RegistrationError::DuplicateMember);
        }
        if self.filled_size() >= self.declared_size {
            return Err(RegistrationError::NoOpenSlots {
                requested: 1,
                available: 0,
            });
        }
        self.member_ids.push(user_id);
        self.updated_at = now;
        Ok(())
    }

    /// Shrink the declared size to the filled size and mark complete.
    ///
    /// Returns the number of seats that were declared but never filled.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> i32 {
        let unfilled = (self.declared_size - self.filled_size()).max(0);
        self.declared_size = self.filled_size();
        self.completeness = Completeness::Complete;
        self.updated_at = now;
        unfilled
    }

    /// Complete with every declared slot filled, nothing left to invite into
    pub fn is_finalized(&self) -> bool {
        self.completeness == Completeness::Complete && self.filled_size() >= self.declared_size
    }

    /// Grow the declared size by one slot for a re-issued invitation.
    ///
    /// The caller reserves the matching seat in the same unit of work.
    pub fn reopen_slot(&mut self, now: DateTime<Utc>) {
        self.declared_size += 1;
        self.completeness = Completeness::PendingInvitations;
        self.updated_at = now;
    }

    /// Apply a status event through the registration state machine.
    ///
    /// `context` carries the competition's capacity when the transition
    /// needs seats (waitlist promotion).
    pub fn transition(
        &mut self,
        event: RegistrationEvent,
        context: Option<&RegistrationGuardContext>,
        now: DateTime<Utc>,
    ) -> Result<RegistrationStatus> {
        let next = RegistrationStateMachine::transition(self.status, event, context)
            .map_err(|e| match e {
                StateError::TerminalState(_) => RegistrationError::RegistrationNotActive,
                StateError::GuardFailed(_) => RegistrationError::InsufficientSeats {
                    requested: context.map_or(self.declared_size, |ctx| ctx.seats_needed),
                    available: context.map_or(0, |ctx| ctx.seats_remaining),
                },
                StateError::InvalidTransition { from, event } => {
                    RegistrationError::InvalidTransition(format!(
                        "cannot {} a {} registration",
                        event, from
                    ))
                }
            })?;

        if next == RegistrationStatus::Confirmed {
            self.confirmed_at = Some(now);
        }
        self.status = next;
        self.updated_at = now;
        Ok(next)
    }
}

/// An invitation for one contact to join a team registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invitation {
    pub id: Uuid,
    pub registration_id: Uuid,
    pub invited_by: Uuid,
    /// Normalized invitee e-mail
    pub contact: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub invitee_id: Option<Uuid>,
    pub status: InvitationStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Invitation {
    /// Issue a pending invitation valid for `ttl`
    pub fn new(
        registration_id: Uuid,
        invited_by: Uuid,
        contact: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let contact = validation::normalize_contact(contact)?;
        if ttl <= Duration::zero() {
            return Err(RegistrationError::Validation(
                "Invitation lifetime must be positive".to_string(),
            ));
        }

        Ok(Invitation {
            id: Uuid::new_v4(),
            registration_id,
            invited_by,
            contact,
            token: generate_token()?,
            invitee_id: None,
            status: InvitationStatus::Pending,
            issued_at: now,
            expires_at: now + ttl,
            resolved_at: None,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == InvitationStatus::Pending
    }

    /// Expiry is inclusive: an invitation is dead at `expires_at`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Seconds left before expiry, `None` once resolved
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        self.is_pending()
            .then(|| (self.expires_at - now).num_seconds().max(0))
    }

    /// Accept or reject on behalf of `responder_id`
    pub fn respond(
        &mut self,
        action: InvitationAction,
        responder_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<InvitationStatus> {
        let event = match action {
            InvitationAction::Accept => InvitationEvent::Accept,
            InvitationAction::Reject => InvitationEvent::Reject,
        };
        let next = self.apply_transition(event, now)?;
        self.invitee_id = Some(responder_id);
        self.resolve(next, now);
        Ok(next)
    }

    /// Mark expired; only valid once `expires_at` has passed
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<()> {
        let next = self.apply_transition(InvitationEvent::Expire, now)?;
        self.resolve(next, now);
        Ok(())
    }

    /// Cancel a pending invitation regardless of expiry
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        let next = self.apply_transition(InvitationEvent::Cancel, now)?;
        self.resolve(next, now);
        Ok(())
    }

    fn resolve(&mut self, status: InvitationStatus, now: DateTime<Utc>) {
        self.status = status;
        self.resolved_at = Some(now);
    }

    fn apply_transition(
        &self,
        event: InvitationEvent,
        now: DateTime<Utc>,
    ) -> Result<InvitationStatus> {
        let context = InvitationGuardContext {
            is_expired: self.is_expired_at(now),
        };
        InvitationStateMachine::transition(self.status, event, Some(&context)).map_err(|e| match e {
            StateError::TerminalState(_) => RegistrationError::InvitationAlreadyResolved,
            StateError::GuardFailed(msg) if event == InvitationEvent::Expire => {
                RegistrationError::InvalidTransition(msg)
            }
            StateError::GuardFailed(_) => RegistrationError::InvitationExpired,
            StateError::InvalidTransition { from, event } => RegistrationError::InvalidTransition(
                format!("cannot {} a {} invitation", event, from),
            ),
        })
    }
}

/// Invitation counts for one registration, by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationTally {
    pub pending: i32,
    pub accepted: i32,
    pub rejected: i32,
    pub expired: i32,
    pub cancelled: i32,
}

impl InvitationTally {
    pub fn from_invitations<'a>(invitations: impl IntoIterator<Item = &'a Invitation>) -> Self {
        invitations
            .into_iter()
            .fold(Self::default(), |mut tally, invitation| {
                match invitation.status {
                    InvitationStatus::Pending => tally.pending += 1,
                    InvitationStatus::Accepted => tally.accepted += 1,
                    InvitationStatus::Rejected => tally.rejected += 1,
                    InvitationStatus::Expired => tally.expired += 1,
                    InvitationStatus::Cancelled => tally.cancelled += 1,
                }
                tally
            })
    }

    /// Every non-cancelled invitation has reached a terminal state
    pub fn all_resolved(&self) -> bool {
        self.pending == 0
    }
}

/// 32 random bytes, URL-safe base64 (43 chars)
fn generate_token() -> Result<String> {
    let mut token_bytes = [0u8; 32];
    getrandom::getrandom(&mut token_bytes).map_err(|e| {
        RegistrationError::Repository(roster_common::RepositoryError::Backend(format!(
            "Failed to generate random bytes: {}",
            e
        )))
    })?;
    Ok(URL_SAFE_NO_PAD.encode(token_bytes))
}
