//! Roster application composition root
//!
//! Wires the configured store, clock, identity backend and notifier into the
//! registrations domain and builds the HTTP router plus the expiry sweeper.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use roster_auth::{AuthBackend, AuthConfig};
use roster_common::{Config, StoreBackend, SystemClock};
use roster_notifications::{NotificationConfig, NotificationDispatcher, NotificationServiceFactory};
use roster_registrations::{
    Competition, ExpirySweeper, MemoryStore, PgStore, RegistrationService, RegistrationStore,
    RegistrationsState,
};
use sqlx::PgPool;

/// Seats offered by the demo competition seeded into the memory backend
const DEMO_COMPETITION_SEATS: i32 = 50;
const DEMO_MAX_TEAM_SIZE: i32 = 4;

/// Everything the binary needs to serve requests and run the sweep
pub struct Application {
    pub router: Router,
    pub sweeper: ExpirySweeper,
}

/// Build the store selected by `STORE_BACKEND`
pub async fn create_store(config: &Config) -> anyhow::Result<Arc<dyn RegistrationStore>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required when STORE_BACKEND=postgres")?;
            let pool = PgPool::connect(url)
                .await
                .context("Database connection failed")?;
            tracing::info!("Database connection established");
            sqlx::migrate!("../../migrations")
                .run(&pool)
                .await
                .context("Database migration failed")?;
            Ok(Arc::new(PgStore::new(pool)))
        }
        StoreBackend::Memory => {
            let store = MemoryStore::new();
            let competition =
                Competition::new("Demo Competition", DEMO_COMPETITION_SEATS, DEMO_MAX_TEAM_SIZE)?;
            tracing::info!(
                competition_id = %competition.id,
                total_seats = competition.total_seats,
                "Using in-memory store with a demo competition"
            );
            store.insert_competition(competition).await;
            Ok(Arc::new(store))
        }
    }
}

/// Create the main application router and the expiry sweeper
pub async fn create_app(config: &Config) -> anyhow::Result<Application> {
    let store = create_store(config).await?;

    let notification_config = NotificationConfig::from_env()?;
    let notifier = NotificationServiceFactory::create(notification_config)?;

    let service = RegistrationService::new(
        store,
        Arc::new(SystemClock),
        NotificationDispatcher::new(Arc::from(notifier)),
        config.invitation_ttl(),
    );

    let state = RegistrationsState {
        service: service.clone(),
        auth: AuthBackend::new(AuthConfig::from(config)),
    };

    Ok(Application {
        router: create_router(state),
        sweeper: ExpirySweeper::new(service, config.expiry_sweep_batch_size),
    })
}

/// Compose domain routers with shared infrastructure routes
pub fn create_router(state: RegistrationsState) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health_check))
        .route(
            "/",
            axum::routing::get(|| async { concat!("Roster API v", env!("CARGO_PKG_VERSION")) }),
        )
        .merge(roster_registrations::routes().with_state(state))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use roster_notifications::MockNotificationService;
    use tower::ServiceExt;

    fn memory_config() -> Config {
        Config {
            store_backend: StoreBackend::Memory,
            database_url: None,
            jwt_secret: "app-test-secret".to_string(),
            jwt_issuer: None,
            jwt_audience: None,
            invitation_ttl_hours: 72,
            expiry_sweep_interval_secs: 120,
            expiry_sweep_batch_size: 500,
            rust_log: "roster=debug".to_string(),
            log_format: "pretty".to_string(),
            port: 3000,
        }
    }

    fn memory_state() -> RegistrationsState {
        let service = RegistrationService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            NotificationDispatcher::new(Arc::new(MockNotificationService::new())),
            chrono::Duration::hours(72),
        );
        RegistrationsState {
            service,
            auth: AuthBackend::new(AuthConfig::from(&memory_config())),
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_router(memory_state());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_registration_routes_are_mounted() {
        let app = create_router(memory_state());
        let response = app
            .oneshot(
                Request::post(format!(
                    "/v1/competitions/{}/register",
                    "00000000-0000-0000-0000-000000000000"
                ))
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();

        // Mounted routes reject the missing bearer token rather than 404
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_app_with_memory_backend() {
        let app = create_app(&memory_config()).await.unwrap();

        let report = app.sweeper.sweep_once().await.unwrap();
        assert_eq!(report.examined, 0);

        let response = app
            .router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
