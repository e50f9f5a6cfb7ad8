//! Registrations domain state and auth backend integration

use axum::extract::FromRef;
use roster_auth::AuthBackend;

use crate::service::RegistrationService;

/// Application state for the registrations domain
#[derive(Clone)]
pub struct RegistrationsState {
    pub service: RegistrationService,
    pub auth: AuthBackend,
}

impl FromRef<RegistrationsState> for AuthBackend {
    fn from_ref(state: &RegistrationsState) -> Self {
        state.auth.clone()
    }
}
