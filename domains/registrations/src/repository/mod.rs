//! Storage interfaces for the registrations domain
//!
//! Every operation runs inside one [`StoreTransaction`]. `lock_*` reads take
//! an exclusive row lock held until commit or rollback; plain reads do not.
//! Dropping a transaction without calling [`StoreTransaction::commit`] rolls
//! it back.
//!
//! Lock order is registration, then its invitations, then the per-user
//! membership lock, then the competition. Registration creation takes only
//! the membership lock and the competition.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roster_common::RepositoryError;
use uuid::Uuid;

use crate::domain::entities::{Competition, Invitation, Registration, UserProfile};

pub use memory::{FailurePoint, MemoryStore};
pub use postgres::PgStore;

pub type RepoResult<T> = std::result::Result<T, RepositoryError>;

/// Opens units of work against a storage backend
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Begin a new unit of work
    async fn begin(&self) -> RepoResult<Box<dyn StoreTransaction>>;
}

/// One atomic unit of work
#[async_trait]
pub trait StoreTransaction: Send {
    // Competitions

    /// Read a competition and lock its row (seat counter)
    async fn lock_competition(&mut self, competition_id: Uuid) -> RepoResult<Option<Competition>>;

    async fn get_competition(&mut self, competition_id: Uuid) -> RepoResult<Option<Competition>>;

    /// Overwrite the seat counter. Only the seat ledger calls this, and only
    /// after `lock_competition` in the same transaction.
    async fn set_seats_remaining(&mut self, competition_id: Uuid, seats: i32) -> RepoResult<()>;

    // Registrations

    async fn lock_registration(&mut self, registration_id: Uuid)
        -> RepoResult<Option<Registration>>;

    async fn get_registration(&mut self, registration_id: Uuid) -> RepoResult<Option<Registration>>;

    /// Find the active (not withdrawn, not rejected) registration that
    /// `user_id` leads or belongs to in a competition.
    ///
    /// Serializes per (competition, user) until the transaction ends, so a
    /// membership check followed by a write cannot interleave with another.
    async fn find_active_registration_for_user(
        &mut self,
        competition_id: Uuid,
        user_id: Uuid,
    ) -> RepoResult<Option<Registration>>;

    /// Insert a registration. Fails with `AlreadyExists` when the leader
    /// already holds an active registration for the competition.
    async fn insert_registration(&mut self, registration: &Registration) -> RepoResult<()>;

    async fn update_registration(&mut self, registration: &Registration) -> RepoResult<()>;

    // Invitations

    async fn lock_invitation(&mut self, invitation_id: Uuid) -> RepoResult<Option<Invitation>>;

    async fn get_invitation(&mut self, invitation_id: Uuid) -> RepoResult<Option<Invitation>>;

    async fn find_invitation_by_token(&mut self, token: &str) -> RepoResult<Option<Invitation>>;

    /// All invitations of a registration in issue order
    async fn list_invitations(&mut self, registration_id: Uuid) -> RepoResult<Vec<Invitation>>;

    /// All invitations of a registration in issue order, locked
    async fn lock_invitations_for_registration(
        &mut self,
        registration_id: Uuid,
    ) -> RepoResult<Vec<Invitation>>;

    /// Insert an invitation. Fails with `AlreadyExists` when a pending
    /// invitation for the same contact already exists on the registration.
    async fn insert_invitation(&mut self, invitation: &Invitation) -> RepoResult<()>;

    async fn update_invitation(&mut self, invitation: &Invitation) -> RepoResult<()>;

    /// Pending invitations with `expires_at <= now`, oldest first, as
    /// `(invitation_id, registration_id)` pairs. Does not lock.
    async fn find_expired_invitations(
        &mut self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> RepoResult<Vec<(Uuid, Uuid)>>;

    // Profiles

    async fn find_profiles(&mut self, user_ids: &[Uuid]) -> RepoResult<Vec<UserProfile>>;

    /// Make every write in this unit of work durable
    async fn commit(self: Box<Self>) -> RepoResult<()>;
}
