//! Registrations domain: competitions, seat ledger, team invitations

pub mod api;
pub mod domain;
pub mod repository;
pub mod service;

// Re-export domain types at the crate root for convenience
pub use domain::commands::{InvitationAction, ReleaseSeats, ReserveSeats, ResolveInvitation};
pub use domain::entities::*;
pub use domain::error::RegistrationError;
pub use domain::state::{
    InvitationEvent, InvitationGuardContext, InvitationStateMachine, InvitationStatus,
    RegistrationEvent, RegistrationGuardContext, RegistrationStateMachine, RegistrationStatus,
};

// Re-export repository types
pub use repository::{
    FailurePoint, MemoryStore, PgStore, RegistrationStore, RepoResult, StoreTransaction,
};

// Re-export service types
pub use service::{
    ExpirySweeper, InvitationLanding, RegisterInput, RegistrationService, RegistrationStatusView,
    SeatLedger, SweepReport,
};

// Re-export API types
pub use api::routes;
pub use api::RegistrationsState;
