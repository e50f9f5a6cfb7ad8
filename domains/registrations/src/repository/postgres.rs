//! PostgreSQL storage backend
//!
//! Row locks are `SELECT ... FOR UPDATE`. Uniqueness of active registrations
//! and pending invitations is enforced by partial unique indexes, surfaced
//! as `RepositoryError::AlreadyExists`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roster_common::RepositoryError;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{RegistrationStore, RepoResult, StoreTransaction};
use crate::domain::entities::{Competition, Invitation, Registration, UserProfile};

const COMPETITION_COLUMNS: &str = "id, title, total_seats, seats_remaining, max_team_size, \
     registration_opens_at, registration_closes_at, created_at, updated_at";

const REGISTRATION_COLUMNS: &str = "id, competition_id, leader_id, entry_type, team_name, \
     declared_size, member_ids, status, completeness, created_at, confirmed_at, updated_at";

const INVITATION_COLUMNS: &str = "id, registration_id, invited_by, contact, token, invitee_id, \
     status, issued_at, expires_at, resolved_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a catalog competition (fixtures and local seeding)
    pub async fn insert_competition(&self, competition: &Competition) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO competitions (id, title, total_seats, seats_remaining, max_team_size,
                                      registration_opens_at, registration_closes_at,
                                      created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(competition.id)
        .bind(&competition.title)
        .bind(competition.total_seats)
        .bind(competition.seats_remaining)
        .bind(competition.max_team_size)
        .bind(competition.registration_opens_at)
        .bind(competition.registration_closes_at)
        .bind(competition.created_at)
        .bind(competition.updated_at)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from_write)?;
        Ok(())
    }

    /// Insert or refresh a public profile
    pub async fn upsert_profile(&self, profile: &UserProfile) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles (id, display_name, email, avatar_url)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                email = EXCLUDED.email,
                avatar_url = EXCLUDED.avatar_url
            "#,
        )
        .bind(profile.id)
        .bind(&profile.display_name)
        .bind(&profile.email)
        .bind(&profile.avatar_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RegistrationStore for PgStore {
    async fn begin(&self) -> RepoResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// A PostgreSQL transaction; rolled back by sqlx when dropped uncommitted
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn lock_competition(&mut self, competition_id: Uuid) -> RepoResult<Option<Competition>> {
        let sql = format!(
            "SELECT {} FROM competitions WHERE id = $1 FOR UPDATE",
            COMPETITION_COLUMNS
        );
        let row = sqlx::query_as::<_, Competition>(&sql)
            .bind(competition_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn get_competition(&mut self, competition_id: Uuid) -> RepoResult<Option<Competition>> {
        let sql = format!(
            "SELECT {} FROM competitions WHERE id = $1",
            COMPETITION_COLUMNS
        );
        let row = sqlx::query_as::<_, Competition>(&sql)
            .bind(competition_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn set_seats_remaining(&mut self, competition_id: Uuid, seats: i32) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE competitions
            SET seats_remaining = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(competition_id)
        .bind(seats)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn lock_registration(
        &mut self,
        registration_id: Uuid,
    ) -> RepoResult<Option<Registration>> {
        let sql = format!(
            "SELECT {} FROM registrations WHERE id = $1 FOR UPDATE",
            REGISTRATION_COLUMNS
        );
        let row = sqlx::query_as::<_, Registration>(&sql)
            .bind(registration_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn get_registration(&mut self, registration_id: Uuid) -> RepoResult<Option<Registration>> {
        let sql = format!(
            "SELECT {} FROM registrations WHERE id = $1",
            REGISTRATION_COLUMNS
        );
        let row = sqlx::query_as::<_, Registration>(&sql)
            .bind(registration_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn find_active_registration_for_user(
        &mut self,
        competition_id: Uuid,
        user_id: Uuid,
    ) -> RepoResult<Option<Registration>> {
        // Per (competition, user), held until the transaction ends
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text), hashtext($2::text))")
            .bind(competition_id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;

        let sql = format!(
            r#"
            SELECT {} FROM registrations
            WHERE competition_id = $1
              AND status NOT IN ('withdrawn', 'rejected')
              AND $2 = ANY(member_ids)
            ORDER BY created_at
            LIMIT 1
            "#,
            REGISTRATION_COLUMNS
        );
        let row = sqlx::query_as::<_, Registration>(&sql)
            .bind(competition_id)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn insert_registration(&mut self, registration: &Registration) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO registrations (id, competition_id, leader_id, entry_type, team_name,
                                       declared_size, member_ids, status, completeness,
                                       created_at, confirmed_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(registration.id)
        .bind(registration.competition_id)
        .bind(registration.leader_id)
        .bind(registration.entry_type)
        .bind(&registration.team_name)
        .bind(registration.declared_size)
        .bind(&registration.member_ids)
        .bind(registration.status)
        .bind(registration.completeness)
        .bind(registration.created_at)
        .bind(registration.confirmed_at)
        .bind(registration.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(RepositoryError::from_write)?;
        Ok(())
    }

    async fn update_registration(&mut self, registration: &Registration) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE registrations SET
                team_name = $2,
                declared_size = $3,
                member_ids = $4,
                status = $5,
                completeness = $6,
                confirmed_at = $7,
                updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(registration.id)
        .bind(&registration.team_name)
        .bind(registration.declared_size)
        .bind(&registration.member_ids)
        .bind(registration.status)
        .bind(registration.completeness)
        .bind(registration.confirmed_at)
        .bind(registration.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(RepositoryError::from_write)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn lock_invitation(&mut self, invitation_id: Uuid) -> RepoResult<Option<Invitation>> {
        let sql = format!(
            "SELECT {} FROM invitations WHERE id = $1 FOR UPDATE",
            INVITATION_COLUMNS
        );
        let row = sqlx::query_as::<_, Invitation>(&sql)
            .bind(invitation_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn get_invitation(&mut self, invitation_id: Uuid) -> RepoResult<Option<Invitation>> {
        let sql = format!(
            "SELECT {} FROM invitations WHERE id = $1",
            INVITATION_COLUMNS
        );
        let row = sqlx::query_as::<_, Invitation>(&sql)
            .bind(invitation_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn find_invitation_by_token(&mut self, token: &str) -> RepoResult<Option<Invitation>> {
        let sql = format!(
            "SELECT {} FROM invitations WHERE token = $1",
            INVITATION_COLUMNS
        );
        let row = sqlx::query_as::<_, Invitation>(&sql)
            .bind(token)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn list_invitations(&mut self, registration_id: Uuid) -> RepoResult<Vec<Invitation>> {
        let sql = format!(
            "SELECT {} FROM invitations WHERE registration_id = $1 ORDER BY issued_at, id",
            INVITATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, Invitation>(&sql)
            .bind(registration_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn lock_invitations_for_registration(
        &mut self,
        registration_id: Uuid,
    ) -> RepoResult<Vec<Invitation>> {
        let sql = format!(
            "SELECT {} FROM invitations WHERE registration_id = $1 ORDER BY issued_at, id FOR UPDATE",
            INVITATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, Invitation>(&sql)
            .bind(registration_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn insert_invitation(&mut self, invitation: &Invitation) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invitations (id, registration_id, invited_by, contact, token, invitee_id,
                                     status, issued_at, expires_at, resolved_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(invitation.id)
        .bind(invitation.registration_id)
        .bind(invitation.invited_by)
        .bind(&invitation.contact)
        .bind(&invitation.token)
        .bind(invitation.invitee_id)
        .bind(invitation.status)
        .bind(invitation.issued_at)
        .bind(invitation.expires_at)
        .bind(invitation.resolved_at)
        .execute(&mut *self.tx)
        .await
        .map_err(RepositoryError::from_write)?;
        Ok(())
    }

    async fn update_invitation(&mut self, invitation: &Invitation) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE invitations SET
                invitee_id = $2,
                status = $3,
                resolved_at = $4
            WHERE id = $1
            "#,
        )
        .bind(invitation.id)
        .bind(invitation.invitee_id)
        .bind(invitation.status)
        .bind(invitation.resolved_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn find_expired_invitations(
        &mut self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> RepoResult<Vec<(Uuid, Uuid)>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"
            SELECT id, registration_id FROM invitations
            WHERE status = 'pending' AND expires_at <= $1
            ORDER BY expires_at
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn find_profiles(&mut self, user_ids: &[Uuid]) -> RepoResult<Vec<UserProfile>> {
        let rows = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, display_name, email, avatar_url
            FROM user_profiles
            WHERE id = ANY($1)
            "#,
        )
        .bind(user_ids.to_vec())
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn commit(self: Box<Self>) -> RepoResult<()> {
        let PgTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}
