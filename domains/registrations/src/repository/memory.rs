//! In-process storage backend
//!
//! A unit of work holds the store's async mutex from `begin` until commit or
//! drop, so units of work are fully serialized. Writes go to a private copy
//! of the state that replaces the shared state only on commit.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roster_common::RepositoryError;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{RegistrationStore, RepoResult, StoreTransaction};
use crate::domain::entities::{Competition, Invitation, Registration, UserProfile};

/// Write operations that can be made to fail once, for rollback tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    SetSeats,
    InsertRegistration,
    UpdateRegistration,
    InsertInvitation,
    UpdateInvitation,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    competitions: HashMap<Uuid, Competition>,
    registrations: HashMap<Uuid, Registration>,
    /// Kept in insertion order so listings follow issue order
    invitations: Vec<Invitation>,
    profiles: HashMap<Uuid, UserProfile>,
}

impl MemoryState {
    fn invitation(&self, invitation_id: Uuid) -> Option<&Invitation> {
        self.invitations.iter().find(|i| i.id == invitation_id)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    failures: Arc<std::sync::Mutex<Vec<FailurePoint>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a competition from the catalog
    pub async fn insert_competition(&self, competition: Competition) {
        let mut state = self.state.lock().await;
        state.competitions.insert(competition.id, competition);
    }

    /// Seed or replace a user's public profile
    pub async fn upsert_profile(&self, profile: UserProfile) {
        let mut state = self.state.lock().await;
        state.profiles.insert(profile.id, profile);
    }

    /// Make the next write at `point` fail with a backend error
    pub fn fail_next(&self, point: FailurePoint) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(point);
    }

    pub async fn competition(&self, competition_id: Uuid) -> Option<Competition> {
        self.state
            .lock()
            .await
            .competitions
            .get(&competition_id)
            .cloned()
    }

    pub async fn registration(&self, registration_id: Uuid) -> Option<Registration> {
        self.state
            .lock()
            .await
            .registrations
            .get(&registration_id)
            .cloned()
    }

    /// Every registration ever created for a competition, any status
    pub async fn registrations_for_competition(&self, competition_id: Uuid) -> Vec<Registration> {
        let state = self.state.lock().await;
        let mut registrations: Vec<Registration> = state
            .registrations
            .values()
            .filter(|r| r.competition_id == competition_id)
            .cloned()
            .collect();
        registrations.sort_by_key(|r| r.created_at);
        registrations
    }

    pub async fn invitations_for_registration(&self, registration_id: Uuid) -> Vec<Invitation> {
        self.state
            .lock()
            .await
            .invitations
            .iter()
            .filter(|i| i.registration_id == registration_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RegistrationStore for MemoryStore {
    async fn begin(&self) -> RepoResult<Box<dyn StoreTransaction>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            failures: Arc::clone(&self.failures),
        }))
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    failures: Arc<std::sync::Mutex<Vec<FailurePoint>>>,
}

impl MemoryTransaction {
    fn check_failure(&self, point: FailurePoint) -> RepoResult<()> {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pos) = failures.iter().position(|p| *p == point) {
            failures.remove(pos);
            return Err(RepositoryError::Backend(format!(
                "injected failure at {:?}",
                point
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn lock_competition(&mut self, competition_id: Uuid) -> RepoResult<Option<Competition>> {
        self.get_competition(competition_id).await
    }

    async fn get_competition(&mut self, competition_id: Uuid) -> RepoResult<Option<Competition>> {
        Ok(self.working.competitions.get(&competition_id).cloned())
    }

    async fn set_seats_remaining(&mut self, competition_id: Uuid, seats: i32) -> RepoResult<()> {
        self.check_failure(FailurePoint::SetSeats)?;
        let competition = self
            .working
            .competitions
            .get_mut(&competition_id)
            .ok_or(RepositoryError::NotFound)?;
        if seats < 0 || seats > competition.total_seats {
            return Err(RepositoryError::InvalidData(format!(
                "seats_remaining {} outside 0..={}",
                seats, competition.total_seats
            )));
        }
        competition.seats_remaining = seats;
        competition.updated_at = Utc::now();
        Ok(())
    }

    async fn lock_registration(
        &mut self,
        registration_id: Uuid,
    ) -> RepoResult<Option<Registration>> {
        self.get_registration(registration_id).await
    }

    async fn get_registration(&mut self, registration_id: Uuid) -> RepoResult<Option<Registration>> {
        Ok(self.working.registrations.get(&registration_id).cloned())
    }

    async fn find_active_registration_for_user(
        &mut self,
        competition_id: Uuid,
        user_id: Uuid,
    ) -> RepoResult<Option<Registration>> {
        Ok(self
            .working
            .registrations
            .values()
            .filter(|r| r.competition_id == competition_id && r.is_active())
            .find(|r| r.is_member(user_id))
            .cloned())
    }

    async fn insert_registration(&mut self, registration: &Registration) -> RepoResult<()> {
        self.check_failure(FailurePoint::InsertRegistration)?;
        let duplicate = self.working.registrations.values().any(|r| {
            r.competition_id == registration.competition_id
                && r.leader_id == registration.leader_id
                && r.is_active()
        });
        if duplicate || self.working.registrations.contains_key(&registration.id) {
            return Err(RepositoryError::AlreadyExists);
        }
        self.working
            .registrations
            .insert(registration.id, registration.clone());
        Ok(())
    }

    async fn update_registration(&mut self, registration: &Registration) -> RepoResult<()> {
        self.check_failure(FailurePoint::UpdateRegistration)?;
        let slot = self
            .working
            .registrations
            .get_mut(&registration.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = registration.clone();
        Ok(())
    }

    async fn lock_invitation(&mut self, invitation_id: Uuid) -> RepoResult<Option<Invitation>> {
        self.get_invitation(invitation_id).await
    }

    async fn get_invitation(&mut self, invitation_id: Uuid) -> RepoResult<Option<Invitation>> {
        Ok(self.working.invitation(invitation_id).cloned())
    }

    async fn find_invitation_by_token(&mut self, token: &str) -> RepoResult<Option<Invitation>> {
        Ok(self
            .working
            .invitations
            .iter()
            .find(|i| i.token == token)
            .cloned())
    }

    async fn list_invitations(&mut self, registration_id: Uuid) -> RepoResult<Vec<Invitation>> {
        Ok(self
            .working
            .invitations
            .iter()
            .filter(|i| i.registration_id == registration_id)
            .cloned()
            .collect())
    }

    async fn lock_invitations_for_registration(
        &mut self,
        registration_id: Uuid,
    ) -> RepoResult<Vec<Invitation>> {
        self.list_invitations(registration_id).await
    }

    async fn insert_invitation(&mut self, invitation: &Invitation) -> RepoResult<()> {
        self.check_failure(FailurePoint::InsertInvitation)?;
        let conflict = self.working.invitations.iter().any(|i| {
            i.id == invitation.id
                || i.token == invitation.token
                || (i.is_pending()
                    && invitation.is_pending()
                    && i.registration_id == invitation.registration_id
                    && i.contact == invitation.contact)
        });
        if conflict {
            return Err(RepositoryError::AlreadyExists);
        }
        self.working.invitations.push(invitation.clone());
        Ok(())
    }

    async fn update_invitation(&mut self, invitation: &Invitation) -> RepoResult<()> {
        self.check_failure(FailurePoint::UpdateInvitation)?;
        let slot = self
            .working
            .invitations
            .iter_mut()
            .find(|i| i.id == invitation.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = invitation.clone();
        Ok(())
    }

    async fn find_expired_invitations(
        &mut self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> RepoResult<Vec<(Uuid, Uuid)>> {
        let mut expired: Vec<&Invitation> = self
            .working
            .invitations
            .iter()
            .filter(|i| i.is_pending() && i.is_expired_at(now))
            .collect();
        expired.sort_by_key(|i| i.expires_at);
        Ok(expired
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|i| (i.id, i.registration_id))
            .collect())
    }

    async fn find_profiles(&mut self, user_ids: &[Uuid]) -> RepoResult<Vec<UserProfile>> {
        Ok(user_ids
            .iter()
            .filter_map(|id| self.working.profiles.get(id).cloned())
            .collect())
    }

    async fn commit(self: Box<Self>) -> RepoResult<()> {
        self.check_failure(FailurePoint::Commit)?;
        let MemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::EntryType;

    async fn seeded() -> (MemoryStore, Competition) {
        let store = MemoryStore::new();
        let competition = Competition::new("Open", 5, 3).unwrap();
        store.insert_competition(competition.clone()).await;
        (store, competition)
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let (store, competition) = seeded().await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.set_seats_remaining(competition.id, 1).await.unwrap();
        }

        assert_eq!(
            store.competition(competition.id).await.unwrap().seats_remaining,
            5
        );
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let (store, competition) = seeded().await;

        let mut tx = store.begin().await.unwrap();
        tx.set_seats_remaining(competition.id, 2).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            store.competition(competition.id).await.unwrap().seats_remaining,
            2
        );
    }

    #[tokio::test]
    async fn test_seat_counter_bounds_enforced() {
        let (store, competition) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.set_seats_remaining(competition.id, 6).await,
            Err(RepositoryError::InvalidData(_))
        ));
        assert!(matches!(
            tx.set_seats_remaining(competition.id, -1).await,
            Err(RepositoryError::InvalidData(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_active_registration_rejected() {
        let (store, competition) = seeded().await;
        let leader = Uuid::new_v4();
        let first =
            Registration::new(&competition, leader, EntryType::Individual, None, 1, Utc::now())
                .unwrap();
        let second =
            Registration::new(&competition, leader, EntryType::Individual, None, 1, Utc::now())
                .unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_registration(&first).await.unwrap();
        assert!(matches!(
            tx.insert_registration(&second).await,
            Err(RepositoryError::AlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_pending_invitation_rejected() {
        let (store, _) = seeded().await;
        let registration_id = Uuid::new_v4();
        let now = Utc::now();
        let ttl = chrono::Duration::hours(1);
        let first = Invitation::new(registration_id, Uuid::new_v4(), "a@x.com", ttl, now).unwrap();
        let second = Invitation::new(registration_id, Uuid::new_v4(), "a@x.com", ttl, now).unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_invitation(&first).await.unwrap();
        assert!(matches!(
            tx.insert_invitation(&second).await,
            Err(RepositoryError::AlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let (store, competition) = seeded().await;
        store.fail_next(FailurePoint::SetSeats);

        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.set_seats_remaining(competition.id, 3).await,
            Err(RepositoryError::Backend(_))
        ));
        assert!(tx.set_seats_remaining(competition.id, 3).await.is_ok());
    }

    #[tokio::test]
    async fn test_find_expired_orders_and_limits() {
        let (store, _) = seeded().await;
        let registration_id = Uuid::new_v4();
        let now = Utc::now();
        let soon = Invitation::new(
            registration_id,
            Uuid::new_v4(),
            "soon@x.com",
            chrono::Duration::minutes(5),
            now,
        )
        .unwrap();
        let sooner = Invitation::new(
            registration_id,
            Uuid::new_v4(),
            "sooner@x.com",
            chrono::Duration::minutes(1),
            now,
        )
        .unwrap();
        let later = Invitation::new(
            registration_id,
            Uuid::new_v4(),
            "later@x.com",
            chrono::Duration::hours(5),
            now,
        )
        .unwrap();

        let mut tx = store.begin().await.unwrap();
        for invitation in [&soon, &sooner, &later] {
            tx.insert_invitation(invitation).await.unwrap();
        }

        let due = now + chrono::Duration::minutes(10);
        let expired = tx.find_expired_invitations(due, 10).await.unwrap();
        assert_eq!(expired, vec![(sooner.id, registration_id), (soon.id, registration_id)]);

        let limited = tx.find_expired_invitations(due, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }
}
