//! Route definitions for the registrations domain API

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{invitations, registrations};
use super::middleware::RegistrationsState;

/// Competition-scoped registration routes
fn competition_routes() -> Router<RegistrationsState> {
    Router::new()
        .route(
            "/v1/competitions/{id}/register",
            post(registrations::register),
        )
        .route(
            "/v1/competitions/{id}/registration-status",
            get(registrations::registration_status),
        )
}

/// Registration management routes
fn registration_routes() -> Router<RegistrationsState> {
    Router::new()
        .route(
            "/v1/registrations/{id}/invitations",
            post(invitations::invite),
        )
        .route(
            "/v1/registrations/{id}/withdraw",
            post(registrations::withdraw),
        )
        .route(
            "/v1/registrations/{id}/finalize",
            post(registrations::finalize),
        )
        .route(
            "/v1/registrations/{id}/status",
            post(registrations::set_status),
        )
}

/// Invitation routes.
///
/// `{invitation}` is the token on the landing and respond routes and the
/// invitation id on the leader routes.
fn invitation_routes() -> Router<RegistrationsState> {
    Router::new()
        .route(
            "/v1/invitations/{invitation}",
            get(invitations::landing).delete(invitations::cancel),
        )
        .route(
            "/v1/invitations/{invitation}/respond",
            post(invitations::respond),
        )
        .route(
            "/v1/invitations/{invitation}/resend",
            post(invitations::resend),
        )
}

/// Create all registrations domain API routes
pub fn routes() -> Router<RegistrationsState> {
    Router::new()
        .merge(competition_routes())
        .merge(registration_routes())
        .merge(invitation_routes())
}
