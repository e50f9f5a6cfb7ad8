//! State machines for registration and invitation records
//!
//! Each state machine defines:
//! - Valid states
//! - Events that trigger transitions
//! - Guard conditions for transitions
//! - Terminal states

use roster_common::StateError;
use serde::{Deserialize, Serialize};

// ============================================================================
// Registration State Machine
// ============================================================================

/// Registration status, stored on the registration row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "registration_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Confirmed,
    Waitlisted,
    Rejected,
    Withdrawn,
}

impl RegistrationStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Withdrawn)
    }

    /// Registrations in these states count against the competition's seats
    pub fn holds_seats(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Get all valid next states from current state
    pub fn valid_transitions(&self) -> &'static [RegistrationStatus] {
        match self {
            Self::Pending => &[
                Self::Confirmed,
                Self::Waitlisted,
                Self::Rejected,
                Self::Withdrawn,
            ],
            Self::Confirmed => &[Self::Withdrawn],
            Self::Waitlisted => &[Self::Confirmed],
            Self::Rejected => &[],
            Self::Withdrawn => &[],
        }
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Waitlisted => write!(f, "waitlisted"),
            Self::Rejected => write!(f, "rejected"),
            Self::Withdrawn => write!(f, "withdrawn"),
        }
    }
}

/// Events that trigger registration status transitions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegistrationEvent {
    /// Operator confirms the entry (or promotes it off the waitlist)
    Confirm,
    /// Operator moves the entry to the waitlist
    Waitlist,
    /// Operator rejects the entry
    Reject,
    /// Leader or operator withdraws the entry
    Withdraw,
}

impl std::fmt::Display for RegistrationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Confirm => write!(f, "confirm"),
            Self::Waitlist => write!(f, "waitlist"),
            Self::Reject => write!(f, "reject"),
            Self::Withdraw => write!(f, "withdraw"),
        }
    }
}

/// Guard context for registration transitions
#[derive(Debug, Clone)]
pub struct RegistrationGuardContext {
    /// Seats the competition has left
    pub seats_remaining: i32,
    /// Seats the registration needs to hold after the transition
    pub seats_needed: i32,
}

impl RegistrationGuardContext {
    pub fn seats_available(&self) -> bool {
        self.seats_remaining >= self.seats_needed
    }
}

/// Registration state machine
pub struct RegistrationStateMachine;

impl RegistrationStateMachine {
    /// Attempt a state transition with guard conditions
    pub fn transition(
        current: RegistrationStatus,
        event: RegistrationEvent,
        context: Option<&RegistrationGuardContext>,
    ) -> Result<RegistrationStatus, StateError> {
        if current.is_terminal() {
            return Err(StateError::TerminalState(current.to_string()));
        }

        let next = match (current, event) {
            (RegistrationStatus::Pending, RegistrationEvent::Confirm) => {
                RegistrationStatus::Confirmed
            }
            (RegistrationStatus::Pending, RegistrationEvent::Waitlist) => {
                RegistrationStatus::Waitlisted
            }
            (RegistrationStatus::Pending, RegistrationEvent::Reject) => {
                RegistrationStatus::Rejected
            }
            (RegistrationStatus::Pending, RegistrationEvent::Withdraw) => {
                RegistrationStatus::Withdrawn
            }
            (RegistrationStatus::Confirmed, RegistrationEvent::Withdraw) => {
                RegistrationStatus::Withdrawn
            }
            (RegistrationStatus::Waitlisted, RegistrationEvent::Confirm) => {
                // Guard: waitlisted entries hold no seats, promotion needs capacity
                if let Some(ctx) = context {
                    if !ctx.seats_available() {
                        return Err(StateError::GuardFailed(
                            "Not enough seats to promote waitlisted registration".to_string(),
                        ));
                    }
                }
                RegistrationStatus::Confirmed
            }
            _ => {
                return Err(StateError::InvalidTransition {
                    from: current.to_string(),
                    event: event.to_string(),
                });
            }
        };

        Ok(next)
    }

    /// Check if a transition is valid without performing it
    pub fn can_transition(
        current: RegistrationStatus,
        event: &RegistrationEvent,
        context: Option<&RegistrationGuardContext>,
    ) -> bool {
        Self::transition(current, *event, context).is_ok()
    }
}

// ============================================================================
// Invitation State Machine
// ============================================================================

/// Invitation status, stored on the invitation row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invitation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
    Cancelled,
}

impl InvitationStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Get all valid next states from current state
    pub fn valid_transitions(&self) -> &'static [InvitationStatus] {
        match self {
            Self::Pending => &[Self::Accepted, Self::Rejected, Self::Expired, Self::Cancelled],
            Self::Accepted | Self::Rejected | Self::Expired | Self::Cancelled => &[],
        }
    }
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Accepted => write!(f, "accepted"),
            Self::Rejected => write!(f, "rejected"),
            Self::Expired => write!(f, "expired"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Events that trigger invitation state transitions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvitationEvent {
    /// Invitee accepts
    Accept,
    /// Invitee rejects
    Reject,
    /// The expiry sweep observes `expires_at <= now`
    Expire,
    /// Leader cancels, or a re-invite supersedes, or the registration ends
    Cancel,
}

impl std::fmt::Display for InvitationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accept => write!(f, "accept"),
            Self::Reject => write!(f, "reject"),
            Self::Expire => write!(f, "expire"),
            Self::Cancel => write!(f, "cancel"),
        }
    }
}

/// Guard context for invitation transitions
#[derive(Debug, Clone)]
pub struct InvitationGuardContext {
    /// Whether `expires_at <= now`
    pub is_expired: bool,
}

/// Invitation state machine
pub struct InvitationStateMachine;

impl InvitationStateMachine {
    /// Attempt a state transition with guard conditions
    pub fn transition(
        current: InvitationStatus,
        event: InvitationEvent,
        context: Option<&InvitationGuardContext>,
    ) -> Result<InvitationStatus, StateError> {
        if current.is_terminal() {
            return Err(StateError::TerminalState(current.to_string()));
        }

        let is_expired = context.map(|ctx| ctx.is_expired).unwrap_or(false);

        let next = match event {
            InvitationEvent::Accept | InvitationEvent::Reject if is_expired => {
                return Err(StateError::GuardFailed(
                    "Cannot respond to an expired invitation".to_string(),
                ));
            }
            InvitationEvent::Accept => InvitationStatus::Accepted,
            InvitationEvent::Reject => InvitationStatus::Rejected,
            InvitationEvent::Expire => {
                if context.is_some() && !is_expired {
                    return Err(StateError::GuardFailed(
                        "Invitation has not reached its expiry".to_string(),
                    ));
                }
                InvitationStatus::Expired
            }
            InvitationEvent::Cancel => InvitationStatus::Cancelled,
        };

        Ok(next)
    }

    /// Check if a transition is valid without performing it
    pub fn can_transition(
        current: InvitationStatus,
        event: &InvitationEvent,
        context: Option<&InvitationGuardContext>,
    ) -> bool {
        Self::transition(current, *event, context).is_ok()
    }
}

// ============================================================================
// Tests
// ============================================================================
