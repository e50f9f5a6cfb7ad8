//! Shared utilities, configuration, and error handling for Roster
//!
//! This crate provides common functionality used across the Roster workspace:
//! - Configuration management following 12-factor principles
//! - Error types and handling
//! - Time sources for request handling and scheduled jobs
//! - Request extractors

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, StoreBackend};
pub use db::RepositoryError;
pub use error::{Error, Result};
pub use extractors::ValidatedJson;
pub use state::StateError;
