//! Concrete authentication backend
//!
//! Identity is owned by an external provider; the backend only verifies
//! the tokens it issues.

use uuid::Uuid;

use crate::config::AuthConfig;
use crate::context::{AuthContext, Role};
use crate::error::AuthError;
use crate::jwt::validate_jwt_token;

/// Domain states expose this via `FromRef`:
/// ```ignore
/// impl FromRef<MyDomainState> for AuthBackend {
///     fn from_ref(state: &MyDomainState) -> Self {
///         state.auth.clone()
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthBackend {
    config: AuthConfig,
}

impl AuthBackend {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Verify a bearer token and build the caller's context
    pub fn authenticate_jwt(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claims = validate_jwt_token(token, &self.config)?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidUserId)?;
        let role = Role::from_claim(claims.role.as_deref());

        tracing::debug!(user_id = %user_id, role = %role, "Authenticated caller");

        Ok(AuthContext {
            user_id,
            role,
            email: claims.email,
        })
    }
}
