//! Domain errors for registration and invitation operations

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use roster_common::{error::error_response, RepositoryError};
use thiserror::Error;

/// Result alias for registration operations
pub type Result<T> = std::result::Result<T, RegistrationError>;

/// Every failure a registration operation can report.
///
/// Each variant maps to one stable error code and HTTP status. Storage
/// failures are logged and rendered as a generic 500.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Not enough seats remaining: requested {requested}, available {available}")]
    InsufficientSeats { requested: i32, available: i32 },

    #[error("User already has an active registration for this competition")]
    AlreadyRegistered,

    #[error("Registration is no longer active")]
    RegistrationNotActive,

    #[error("Only the team leader can perform this action")]
    NotTeamLeader,

    #[error("No open slots: requested {requested}, available {available}")]
    NoOpenSlots { requested: i32, available: i32 },

    #[error("Invitation has expired")]
    InvitationExpired,

    #[error("Invitation has already been resolved")]
    InvitationAlreadyResolved,

    #[error("User is already a member of this team")]
    DuplicateMember,

    #[error("Registration window is closed")]
    RegistrationWindowClosed,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Storage error: {0}")]
    Repository(#[from] RepositoryError),
}

impl RegistrationError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InsufficientSeats { .. }
            | Self::AlreadyRegistered
            | Self::RegistrationNotActive
            | Self::NoOpenSlots { .. }
            | Self::InvitationAlreadyResolved
            | Self::DuplicateMember
            | Self::InvalidTransition(_) => StatusCode::CONFLICT,
            Self::NotTeamLeader | Self::RegistrationWindowClosed | Self::Forbidden(_) => {
                StatusCode::FORBIDDEN
            }
            Self::InvitationExpired => StatusCode::GONE,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientSeats { .. } => "INSUFFICIENT_SEATS",
            Self::AlreadyRegistered => "ALREADY_REGISTERED",
            Self::RegistrationNotActive => "REGISTRATION_NOT_ACTIVE",
            Self::NotTeamLeader => "NOT_TEAM_LEADER",
            Self::NoOpenSlots { .. } => "NO_OPEN_SLOTS",
            Self::InvitationExpired => "INVITATION_EXPIRED",
            Self::InvitationAlreadyResolved => "INVITATION_ALREADY_RESOLVED",
            Self::DuplicateMember => "DUPLICATE_MEMBER",
            Self::RegistrationWindowClosed => "REGISTRATION_WINDOW_CLOSED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::Repository(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for RegistrationError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let Self::Repository(ref err) = self {
            tracing::error!(error = %err, "Storage failure during registration operation");
            return error_response(status, self.error_code(), "Internal server error");
        }

        error_response(status, self.error_code(), &self.to_string())
    }
}
