//! API layer for the registrations domain
//!
//! Contains HTTP handlers, routes, and domain state definition.

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use middleware::RegistrationsState;
pub use routes::routes;
