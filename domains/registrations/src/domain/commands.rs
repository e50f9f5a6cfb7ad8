//! Command objects consumed by the seat ledger and invitation coordinator

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Take `count` seats from a competition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveSeats {
    pub competition_id: Uuid,
    pub count: i32,
}

/// Return `count` seats to a competition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseSeats {
    pub competition_id: Uuid,
    pub count: i32,
}

/// How an invitee answers an invitation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationAction {
    Accept,
    Reject,
}

impl std::fmt::Display for InvitationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accept => write!(f, "accept"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// Resolve a pending invitation on behalf of an authenticated invitee
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveInvitation {
    /// Secret token carried by the invitation link
    pub token: String,
    pub action: InvitationAction,
    pub responder_id: Uuid,
}
