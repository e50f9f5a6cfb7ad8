//! PostgreSQL store tests
//!
//! Run with a disposable database:
//! `DATABASE_URL=postgres://... cargo test -p roster-registrations --test postgres -- --ignored`

mod common;

use std::sync::Arc;

use chrono::Duration;
use roster_common::ManualClock;
use roster_notifications::{MockNotificationService, NotificationDispatcher};
use roster_registrations::{
    Competition, EntryType, InvitationAction, InvitationStatus, PgStore, RegisterInput,
    RegistrationError, RegistrationService, RegistrationStatus, ResolveInvitation,
};
use sqlx::PgPool;

use common::Participant;

async fn setup() -> (PgStore, RegistrationService, ManualClock) {
    let url = std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("TEST_DATABASE_URL or DATABASE_URL must be set");
    let pool = PgPool::connect(&url).await.unwrap();
    sqlx::migrate!("../../migrations").run(&pool).await.unwrap();

    let store = PgStore::new(pool);
    let clock = ManualClock::new(chrono::Utc::now());
    let service = RegistrationService::new(
        Arc::new(store.clone()),
        Arc::new(clock.clone()),
        NotificationDispatcher::new(Arc::new(MockNotificationService::new())),
        Duration::hours(1),
    );
    (store, service, clock)
}

async fn seeded_competition(store: &PgStore, total_seats: i32) -> Competition {
    let competition = Competition::new("Postgres Cup", total_seats, 4).unwrap();
    store.insert_competition(&competition).await.unwrap();
    competition
}

async fn seats_remaining(store: &PgStore, competition: &Competition) -> i32 {
    sqlx::query_scalar("SELECT seats_remaining FROM competitions WHERE id = $1")
        .bind(competition.id)
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_pg_team_lifecycle() {
    let (store, service, _) = setup().await;
    let competition = seeded_competition(&store, 10).await;
    let leader = Participant::new("pg-lead@x.com");
    let mate = Participant::new("pg-mate@x.com");

    let registration = service
        .register(
            competition.id,
            &leader.auth,
            RegisterInput {
                entry_type: EntryType::Team,
                team_name: Some("Postgres Pals".to_string()),
                declared_size: 3,
            },
        )
        .await
        .unwrap();
    assert_eq!(seats_remaining(&store, &competition).await, 7);

    let invitations = service
        .invite(
            registration.id,
            &leader.auth,
            &["pg-mate@x.com".to_string(), "pg-ghost@x.com".to_string()],
        )
        .await
        .unwrap();

    let (accepted, _) = service
        .respond(ResolveInvitation {
            token: invitations[0].token.clone(),
            action: InvitationAction::Accept,
            responder_id: mate.id(),
        })
        .await
        .unwrap();
    assert_eq!(accepted.status, InvitationStatus::Accepted);

    let finalized = service
        .finalize(registration.id, &leader.auth)
        .await
        .unwrap();
    assert_eq!(finalized.declared_size, 2);
    assert_eq!(seats_remaining(&store, &competition).await, 8);

    let withdrawn = service
        .withdraw(registration.id, &leader.auth)
        .await
        .unwrap();
    assert_eq!(withdrawn.status, RegistrationStatus::Withdrawn);
    assert_eq!(seats_remaining(&store, &competition).await, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Requires DATABASE_URL
async fn test_pg_last_seat_race() {
    let (store, service, _) = setup().await;
    let competition = seeded_competition(&store, 1).await;

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let service = service.clone();
            let participant = Participant::new(&format!("pg-racer{i}@x.com"));
            let competition_id = competition.id;
            tokio::spawn(async move {
                service
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
            })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(RegistrationError::InsufficientSeats { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(seats_remaining(&store, &competition).await, 0);
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_pg_duplicate_active_registration_is_rejected() {
    let (store, service, _) = setup().await;
    let competition = seeded_competition(&store, 5).await;
    let leader = Participant::new("pg-dup@x.com");
    let input = RegisterInput {
        entry_type: EntryType::Individual,
        team_name: None,
        declared_size: 1,
    };

    service
        .register(competition.id, &leader.auth, input.clone())
        .await
        .unwrap();
    let second = service.register(competition.id, &leader.auth, input).await;

    assert!(matches!(second, Err(RegistrationError::AlreadyRegistered)));
    assert_eq!(seats_remaining(&store, &competition).await, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Requires DATABASE_URL
async fn test_pg_concurrent_accepts_place_user_in_one_team() {
    let (store, service, _) = setup().await;
    let competition = seeded_competition(&store, 10).await;
    let drifter = Participant::new("pg-drifter@x.com");

    let mut tokens = Vec::new();
    for leader_email in ["pg-red@x.com", "pg-blue@x.com"] {
        let leader = Participant::new(leader_email);
        let team = service
            .register(
                competition.id,
                &leader.auth,
                RegisterInput {
                    entry_type: EntryType::Team,
                    team_name: Some(format!("Team {leader_email}")),
                    declared_size: 2,
                },
            )
            .await
            .unwrap();
        let invitations = service
            .invite(team.id, &leader.auth, &["pg-drifter@x.com".to_string()])
            .await
            .unwrap();
        tokens.push(invitations[0].token.clone());
    }

    let handles: Vec<_> = tokens
        .into_iter()
        .map(|token| {
            let service = service.clone();
            let responder_id = drifter.id();
            tokio::spawn(async move {
                service
                    .respond(ResolveInvitation {
                        token,
                        action: InvitationAction::Accept,
                        responder_id,
                    })
                    .await
            })
        })
        .collect();

    let mut joined = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => joined += 1,
            Err(RegistrationError::AlreadyRegistered) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(joined, 1);

    let memberships: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM registrations WHERE competition_id = $1 AND $2 = ANY(member_ids)",
    )
    .bind(competition.id)
    .bind(drifter.id())
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(memberships, 1);
}
