//! Shared fixtures for registrations integration tests
//!
//! Every test runs against a fresh `MemoryStore`, a `ManualClock` pinned to
//! a fixed instant and a recording notification mock.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use roster_auth::{AuthBackend, AuthConfig, AuthContext, IdentityClaims, Role};
use roster_common::ManualClock;
use roster_notifications::{MockNotificationService, NotificationDispatcher, NotificationEvent};
use roster_registrations::{
    Competition, EntryType, Invitation, MemoryStore, RegisterInput, Registration,
    RegistrationService, RegistrationsState, UserProfile,
};
use uuid::Uuid;

pub const JWT_SECRET: &str = "registrations-test-secret";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// A participant with a verified e-mail
pub struct Participant {
    pub auth: AuthContext,
}

impl Participant {
    pub fn new(email: &str) -> Self {
        let mut auth = AuthContext::new(Uuid::new_v4(), Role::Participant);
        auth.email = Some(email.to_string());
        Self { auth }
    }

    pub fn operator() -> Self {
        Self {
            auth: AuthContext::new(Uuid::new_v4(), Role::Operator),
        }
    }

    pub fn id(&self) -> Uuid {
        self.auth.user_id
    }

    /// Signed bearer token for the HTTP layer
    pub fn bearer(&self) -> String {
        let now = Utc::now().timestamp() as u64;
        let claims = IdentityClaims {
            sub: self.auth.user_id.to_string(),
            role: Some(self.auth.role.to_string()),
            email: self.auth.email.clone(),
            iat: now,
            exp: now + 3600,
        };
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .unwrap();
        format!("Bearer {}", token)
    }
}

pub struct TestHarness {
    pub store: MemoryStore,
    pub clock: ManualClock,
    pub notifications: MockNotificationService,
    pub service: RegistrationService,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_ttl(Duration::hours(72))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let store = MemoryStore::new();
        let clock = ManualClock::new(start_time());
        let notifications = MockNotificationService::new();
        let service = RegistrationService::new(
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
            NotificationDispatcher::new(Arc::new(notifications.clone())),
            ttl,
        );
        Self {
            store,
            clock,
            notifications,
            service,
        }
    }

    /// Seed an open competition
    pub async fn competition(&self, total_seats: i32, max_team_size: i32) -> Competition {
        let competition = Competition::new("Rust Systems Cup", total_seats, max_team_size).unwrap();
        self.store.insert_competition(competition.clone()).await;
        competition
    }

    pub async fn profile(&self, participant: &Participant, name: &str) {
        self.store
            .upsert_profile(UserProfile {
                id: participant.id(),
                display_name: name.to_string(),
                email: participant.auth.email.clone(),
                avatar_url: None,
            })
            .await;
    }

    pub async fn seats_remaining(&self, competition_id: Uuid) -> i32 {
        self.store
            .competition(competition_id)
            .await
            .unwrap()
            .seats_remaining
    }

    /// Sum of seats held by every registration in the competition
    pub async fn seats_held(&self, competition_id: Uuid) -> i32 {
        self.store
            .registrations_for_competition(competition_id)
            .await
            .iter()
            .map(Registration::seats_held)
            .sum()
    }

    pub async fn register_team(
        &self,
        competition_id: Uuid,
        leader: &Participant,
        declared_size: i32,
    ) -> Registration {
        self.service
            .register(
                competition_id,
                &leader.auth,
                RegisterInput {
                    entry_type: EntryType::Team,
                    team_name: Some("Borrow Checkers".to_string()),
                    declared_size,
                },
            )
            .await
            .unwrap()
    }

    pub async fn register_individual(
        &self,
        competition_id: Uuid,
        participant: &Participant,
    ) -> Registration {
        self.service
            .register(
                competition_id,
                &participant.auth,
                RegisterInput {
                    entry_type: EntryType::Individual,
                    team_name: None,
                    declared_size: 1,
                },
            )
            .await
            .unwrap()
    }

    pub async fn invite(
        &self,
        registration_id: Uuid,
        leader: &Participant,
        contacts: &[&str],
    ) -> Vec<Invitation> {
        let contacts: Vec<String> = contacts.iter().map(|c| c.to_string()).collect();
        self.service
            .invite(registration_id, &leader.auth, &contacts)
            .await
            .unwrap()
    }

    /// Wait for the post-commit dispatcher to deliver at least `count` events
    pub async fn wait_for_notifications(&self, count: usize) -> Vec<NotificationEvent> {
        for _ in 0..100 {
            let events = self.notifications.recorded_events();
            if events.len() >= count {
                return events;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        self.notifications.recorded_events()
    }

    pub fn state(&self) -> RegistrationsState {
        RegistrationsState {
            service: self.service.clone(),
            auth: AuthBackend::new(AuthConfig {
                jwt_secret: JWT_SECRET.to_string(),
                issuer: None,
                audience: None,
            }),
        }
    }
}
