//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables to ensure
//! clean separation between code and config.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Default invitation lifetime
pub const DEFAULT_INVITATION_TTL_HOURS: i64 = 72;

/// Expiry sweep interval bounds (seconds)
pub const MIN_SWEEP_INTERVAL_SECS: u64 = 60;
pub const MAX_SWEEP_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 120;

/// Default number of invitations expired per sweep pass
pub const DEFAULT_SWEEP_BATCH_SIZE: i64 = 500;

/// Which storage backend the server runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(anyhow::anyhow!(
                "Unknown STORE_BACKEND: {}. Supported backends: postgres, memory",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Storage backend selection
    pub store_backend: StoreBackend,

    /// Database connection URL (required for the postgres backend)
    pub database_url: Option<String>,

    /// Identity provider token verification
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,

    /// Invitation lifecycle
    pub invitation_ttl_hours: i64,
    pub expiry_sweep_interval_secs: u64,
    pub expiry_sweep_batch_size: i64,

    /// Runtime configuration
    pub rust_log: String,
    pub log_format: String,
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let store_backend: StoreBackend = env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()?;

        let database_url = env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(anyhow::anyhow!(
                "DATABASE_URL is required when STORE_BACKEND=postgres"
            ));
        }

        let invitation_ttl_hours = env::var("INVITATION_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|hours| *hours > 0)
            .unwrap_or(DEFAULT_INVITATION_TTL_HOURS);

        let config = Self {
            store_backend,
            database_url,

            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET is required"))?,
            jwt_issuer: env::var("JWT_ISSUER").ok(),
            jwt_audience: env::var("JWT_AUDIENCE").ok(),

            invitation_ttl_hours,
            expiry_sweep_interval_secs: clamp_sweep_interval(
                env::var("EXPIRY_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
            ),
            expiry_sweep_batch_size: env::var("EXPIRY_SWEEP_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_SWEEP_BATCH_SIZE),

            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "roster=debug".to_string()),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
        };

        Ok(config)
    }

    /// Invitation lifetime as a chrono duration
    pub fn invitation_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.invitation_ttl_hours)
    }
}

/// The sweep runs every 1–5 minutes regardless of what the environment asks for
pub fn clamp_sweep_interval(secs: u64) -> u64 {
    secs.clamp(MIN_SWEEP_INTERVAL_SECS, MAX_SWEEP_INTERVAL_SECS)
}
