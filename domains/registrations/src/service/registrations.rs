//! Registration lifecycle: register, withdraw, finalize, operator status

use roster_auth::AuthContext;
use roster_common::RepositoryError;
use uuid::Uuid;

use super::coordinator::{cancel_pending, recompute_completeness, SlotPolicy};
use super::{RegistrationService, SeatLedger};
use crate::domain::commands::{ReleaseSeats, ReserveSeats};
use crate::domain::entities::{EntryType, InvitationTally, Registration};
use crate::domain::error::{RegistrationError, Result};
use crate::domain::state::{RegistrationEvent, RegistrationGuardContext, RegistrationStatus};

/// Registration request after transport decoding
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub entry_type: EntryType,
    pub team_name: Option<String>,
    pub declared_size: i32,
}

impl RegistrationService {
    /// Create a pending registration and reserve its declared seats.
    ///
    /// The reservation and the insert share one unit of work: if either
    /// fails, neither is visible.
    pub async fn register(
        &self,
        competition_id: Uuid,
        leader: &AuthContext,
        input: RegisterInput,
    ) -> Result<Registration> {
        let now = self.now();
        let mut tx = self.store.begin().await?;

        let competition = tx
            .get_competition(competition_id)
            .await?
            .ok_or(RegistrationError::NotFound("Competition"))?;

        if !competition.is_registration_open(now) {
            return Err(RegistrationError::RegistrationWindowClosed);
        }

        let registration = Registration::new(
            &competition,
            leader.user_id,
            input.entry_type,
            input.team_name,
            input.declared_size,
            now,
        )?;

        if tx
            .find_active_registration_for_user(competition_id, leader.user_id)
            .await?
            .is_some()
        {
            return Err(RegistrationError::AlreadyRegistered);
        }

        SeatLedger::reserve(
            tx.as_mut(),
            ReserveSeats {
                competition_id,
                count: registration.declared_size,
            },
        )
        .await?;

        tx.insert_registration(&registration)
            .await
            .map_err(|e| match e {
                RepositoryError::AlreadyExists => RegistrationError::AlreadyRegistered,
                other => RegistrationError::Repository(other),
            })?;

        tx.commit().await?;

        tracing::info!(
            registration_id = %registration.id,
            competition_id = %competition_id,
            leader_id = %leader.user_id,
            entry_type = %registration.entry_type,
            declared_size = registration.declared_size,
            "Registration created"
        );

        Ok(registration)
    }

    /// Withdraw a pending or confirmed registration.
    ///
    /// Cancels every pending invitation and releases the whole declared
    /// allocation, filled seats included.
    pub async fn withdraw(
        &self,
        registration_id: Uuid,
        requester: &AuthContext,
    ) -> Result<Registration> {
        let now = self.now();
        let mut tx = self.store.begin().await?;

        let mut registration = tx
            .lock_registration(registration_id)
            .await?
            .ok_or(RegistrationError::NotFound("Registration"))?;

        if !registration.is_leader(requester.user_id) && !requester.is_operator() {
            return Err(RegistrationError::NotTeamLeader);
        }

        let seats_held = registration.seats_held();
        registration.transition(RegistrationEvent::Withdraw, None, now)?;

        let mut invitations = tx.lock_invitations_for_registration(registration.id).await?;
        let cancelled = cancel_pending(tx.as_mut(), &mut invitations, now).await?;

        SeatLedger::release(
            tx.as_mut(),
            ReleaseSeats {
                competition_id: registration.competition_id,
                count: seats_held,
            },
        )
        .await?;

        tx.update_registration(&registration).await?;
        tx.commit().await?;

        tracing::info!(
            registration_id = %registration.id,
            requester_id = %requester.user_id,
            seats_released = seats_held,
            invitations_cancelled = cancelled,
            "Registration withdrawn"
        );

        Ok(registration)
    }

    /// Leader closes the team early: outstanding invitations are cancelled,
    /// the declared size shrinks to the filled size and unfilled seats go
    /// back to the competition.
    pub async fn finalize(
        &self,
        registration_id: Uuid,
        requester: &AuthContext,
    ) -> Result<Registration> {
        let now = self.now();
        let mut tx = self.store.begin().await?;

        let mut registration = tx
            .lock_registration(registration_id)
            .await?
            .ok_or(RegistrationError::NotFound("Registration"))?;

        if !registration.is_leader(requester.user_id) {
            return Err(RegistrationError::NotTeamLeader);
        }
        if !registration.is_active() {
            return Err(RegistrationError::RegistrationNotActive);
        }

        let mut invitations = tx.lock_invitations_for_registration(registration.id).await?;
        cancel_pending(tx.as_mut(), &mut invitations, now).await?;
        recompute_completeness(
            tx.as_mut(),
            &mut registration,
            &invitations,
            SlotPolicy::Release,
            now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            registration_id = %registration.id,
            declared_size = registration.declared_size,
            "Registration finalized by leader"
        );

        Ok(registration)
    }

    /// Operator-driven status change: confirm, waitlist or reject.
    ///
    /// Waitlisted and rejected registrations hold no seats. Promoting a
    /// waitlisted registration re-reserves its seats and fails with
    /// `InsufficientSeats` when capacity is short.
    pub async fn set_status(
        &self,
        registration_id: Uuid,
        operator: &AuthContext,
        target: RegistrationStatus,
    ) -> Result<Registration> {
        if !operator.is_operator() {
            return Err(RegistrationError::Forbidden(
                "operator role required".to_string(),
            ));
        }

        let event = match target {
            RegistrationStatus::Confirmed => RegistrationEvent::Confirm,
            RegistrationStatus::Waitlisted => RegistrationEvent::Waitlist,
            RegistrationStatus::Rejected => RegistrationEvent::Reject,
            RegistrationStatus::Pending | RegistrationStatus::Withdrawn => {
                return Err(RegistrationError::Validation(format!(
                    "Status '{}' cannot be set directly",
                    target
                )));
            }
        };

        let now = self.now();
        let mut tx = self.store.begin().await?;

        let mut registration = tx
            .lock_registration(registration_id)
            .await?
            .ok_or(RegistrationError::NotFound("Registration"))?;
        let mut invitations = tx.lock_invitations_for_registration(registration.id).await?;

        let previous = registration.status;
        let seats_held = registration.seats_held();

        if previous == RegistrationStatus::Waitlisted && event == RegistrationEvent::Confirm {
            // Nothing left to wait for: only the filled size comes back
            let tally = InvitationTally::from_invitations(&invitations);
            if tally.all_resolved() && registration.filled_size() < registration.declared_size {
                registration.finalize(now);
            }

            let competition = tx
                .lock_competition(registration.competition_id)
                .await?
                .ok_or(RegistrationError::NotFound("Competition"))?;
            let context = RegistrationGuardContext {
                seats_remaining: competition.seats_remaining,
                seats_needed: registration.declared_size,
            };
            registration.transition(event, Some(&context), now)?;

            SeatLedger::reserve(
                tx.as_mut(),
                ReserveSeats {
                    competition_id: registration.competition_id,
                    count: registration.declared_size,
                },
            )
            .await?;
        } else {
            registration.transition(event, None, now)?;

            if registration.status == RegistrationStatus::Rejected {
                cancel_pending(tx.as_mut(), &mut invitations, now).await?;
            }

            let released = seats_held - registration.seats_held();
            SeatLedger::release(
                tx.as_mut(),
                ReleaseSeats {
                    competition_id: registration.competition_id,
                    count: released,
                },
            )
            .await?;
        }

        tx.update_registration(&registration).await?;
        tx.commit().await?;

        tracing::info!(
            registration_id = %registration.id,
            operator_id = %operator.user_id,
            from = %previous,
            to = %registration.status,
            "Registration status changed"
        );

        Ok(registration)
    }
}
