//! Identity extraction for the Roster API
//!
//! The identity provider issues HS256 JWTs; this crate verifies them and
//! hands handlers a verified `{user_id, role}` through axum extractors that
//! work with any state implementing `FromRef<S>` for `AuthBackend`.

mod backend;
mod claims;
mod config;
mod context;
mod error;
mod extractors;
mod jwt;

pub use backend::AuthBackend;
pub use claims::IdentityClaims;
pub use config::AuthConfig;
pub use context::{AuthContext, Role};
pub use error::AuthError;
pub use extractors::{AuthUser, OperatorUser};
