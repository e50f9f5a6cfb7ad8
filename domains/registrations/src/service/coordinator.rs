//! Team invitation coordinator
//!
//! Issues, resolves and cancels invitations, and after every invitation
//! transition recomputes the owning registration's completeness. When an
//! invitee answers or an invitation expires and nothing is left pending,
//! the registration is finalized: its declared size shrinks to the filled
//! size and the difference is released. Leader cancels and supersedes keep
//! the declared slots open for another invitation.

use chrono::{DateTime, Utc};
use roster_auth::AuthContext;
use roster_common::RepositoryError;
use roster_notifications::NotificationKind;
use uuid::Uuid;

use super::{Outbox, RegistrationService, SeatLedger};
use crate::domain::commands::{InvitationAction, ReleaseSeats, ReserveSeats, ResolveInvitation};
use crate::domain::entities::{Completeness, EntryType, Invitation, InvitationTally, Registration};
use crate::domain::error::{RegistrationError, Result};
use crate::domain::state::{InvitationStatus, RegistrationStatus};
use crate::domain::validation;
use crate::repository::StoreTransaction;

impl RegistrationService {
    /// Invite contacts to fill a pending team registration.
    ///
    /// An existing pending invitation to the same contact is superseded.
    /// The whole batch fails with `NoOpenSlots` if it does not fit.
    pub async fn invite(
        &self,
        registration_id: Uuid,
        leader: &AuthContext,
        contacts: &[String],
    ) -> Result<Vec<Invitation>> {
        let contacts = validation::normalize_contacts(contacts)?;
        let now = self.now();
        let mut tx = self.store.begin().await?;

        let mut registration = tx
            .lock_registration(registration_id)
            .await?
            .ok_or(RegistrationError::NotFound("Registration"))?;

        if !registration.is_leader(leader.user_id) {
            return Err(RegistrationError::NotTeamLeader);
        }
        if registration.entry_type == EntryType::Individual {
            return Err(RegistrationError::Validation(
                "Individual entries cannot invite teammates".to_string(),
            ));
        }
        if registration.status != RegistrationStatus::Pending {
            return Err(RegistrationError::RegistrationNotActive);
        }

        let mut invitations = tx.lock_invitations_for_registration(registration.id).await?;

        let leader_email = leader.email.as_deref().map(str::to_lowercase);
        for contact in &contacts {
            let already_joined = invitations
                .iter()
                .any(|i| i.status == InvitationStatus::Accepted && &i.contact == contact);
            if already_joined || leader_email.as_deref() == Some(contact.as_str()) {
                return Err(RegistrationError::DuplicateMember);
            }
        }

        let mut superseded = Vec::new();
        for invitation in invitations
            .iter_mut()
            .filter(|i| i.is_pending() && contacts.contains(&i.contact))
        {
            invitation.cancel(now)?;
            superseded.push(invitation.id);
        }

        let pending = InvitationTally::from_invitations(&invitations).pending;
        let open = registration.open_slots(pending);
        let requested = contacts.len() as i32;
        if requested > open {
            return Err(RegistrationError::NoOpenSlots {
                requested,
                available: open,
            });
        }

        for invitation in invitations.iter().filter(|i| superseded.contains(&i.id)) {
            tx.update_invitation(invitation).await?;
        }

        let mut outbox = Outbox::default();
        let mut issued = Vec::with_capacity(contacts.len());
        for contact in &contacts {
            let invitation = Invitation::new(
                registration.id,
                leader.user_id,
                contact,
                self.invitation_ttl,
                now,
            )?;
            insert_invitation(tx.as_mut(), &invitation).await?;
            outbox.push(NotificationKind::Invited, &invitation, now);
            issued.push(invitation.clone());
            invitations.push(invitation);
        }

        recompute_completeness(
            tx.as_mut(),
            &mut registration,
            &invitations,
            SlotPolicy::Keep,
            now,
        )
        .await?;
        tx.commit().await?;
        self.publish(outbox);

        tracing::info!(
            registration_id = %registration.id,
            issued = issued.len(),
            superseded = superseded.len(),
            "Invitations issued"
        );

        Ok(issued)
    }

    /// Accept or reject an invitation on behalf of the authenticated invitee.
    ///
    /// Serializes on the registration row, so a response racing the expiry
    /// sweep or a withdrawal sees whichever committed first.
    pub async fn respond(&self, command: ResolveInvitation) -> Result<(Invitation, Registration)> {
        let now = self.now();
        let mut tx = self.store.begin().await?;

        let found = tx
            .find_invitation_by_token(&command.token)
            .await?
            .ok_or(RegistrationError::NotFound("Invitation"))?;

        let mut registration = tx
            .lock_registration(found.registration_id)
            .await?
            .ok_or(RegistrationError::NotFound("Registration"))?;
        if !registration.is_active() {
            return Err(RegistrationError::RegistrationNotActive);
        }

        let mut invitations = tx.lock_invitations_for_registration(registration.id).await?;
        let index = invitations
            .iter()
            .position(|i| i.id == found.id)
            .ok_or(RegistrationError::NotFound("Invitation"))?;

        let status = invitations[index].respond(command.action, command.responder_id, now)?;

        if command.action == InvitationAction::Accept {
            if registration.is_member(command.responder_id) {
                return Err(RegistrationError::DuplicateMember);
            }
            if tx
                .find_active_registration_for_user(registration.competition_id, command.responder_id)
                .await?
                .is_some()
            {
                return Err(RegistrationError::AlreadyRegistered);
            }
            registration.add_member(command.responder_id, now)?;
        }

        let invitation = invitations[index].clone();
        tx.update_invitation(&invitation).await?;

        let mut outbox = Outbox::default();
        let kind = match status {
            InvitationStatus::Accepted => NotificationKind::Accepted,
            _ => NotificationKind::Rejected,
        };
        outbox.push(kind, &invitation, now);

        recompute_completeness(
            tx.as_mut(),
            &mut registration,
            &invitations,
            SlotPolicy::Release,
            now,
        )
        .await?;
        tx.commit().await?;
        self.publish(outbox);

        tracing::info!(
            invitation_id = %invitation.id,
            registration_id = %registration.id,
            responder_id = %command.responder_id,
            status = %invitation.status,
            "Invitation resolved"
        );

        Ok((invitation, registration))
    }

    /// Leader cancels a pending invitation
    pub async fn cancel_invitation(
        &self,
        invitation_id: Uuid,
        leader: &AuthContext,
    ) -> Result<Invitation> {
        let now = self.now();
        let mut tx = self.store.begin().await?;

        let (mut registration, mut invitations, index) =
            lock_for_invitation(tx.as_mut(), invitation_id).await?;
        if !registration.is_leader(leader.user_id) {
            return Err(RegistrationError::NotTeamLeader);
        }

        invitations[index].cancel(now)?;
        let invitation = invitations[index].clone();
        tx.update_invitation(&invitation).await?;

        recompute_completeness(
            tx.as_mut(),
            &mut registration,
            &invitations,
            SlotPolicy::Keep,
            now,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            invitation_id = %invitation.id,
            registration_id = %registration.id,
            "Invitation cancelled"
        );

        Ok(invitation)
    }

    /// Re-issue a pending or expired invitation with a fresh token and
    /// expiry. The old invitation is superseded, never reused.
    ///
    /// When the expired invitation's slot was already given up by
    /// finalization, one seat is reserved again to reopen it.
    pub async fn resend_invitation(
        &self,
        invitation_id: Uuid,
        leader: &AuthContext,
    ) -> Result<Invitation> {
        let now = self.now();
        let mut tx = self.store.begin().await?;

        let (mut registration, mut invitations, index) =
            lock_for_invitation(tx.as_mut(), invitation_id).await?;
        if !registration.is_leader(leader.user_id) {
            return Err(RegistrationError::NotTeamLeader);
        }
        if registration.status != RegistrationStatus::Pending {
            return Err(RegistrationError::RegistrationNotActive);
        }

        let contact = invitations[index].contact.clone();
        let target_status = invitations[index].status;
        match target_status {
            InvitationStatus::Pending | InvitationStatus::Expired => {}
            _ => return Err(RegistrationError::InvitationAlreadyResolved),
        }
        if invitations
            .iter()
            .any(|i| i.status == InvitationStatus::Accepted && i.contact == contact)
        {
            return Err(RegistrationError::DuplicateMember);
        }

        let mut superseded = Vec::new();
        for invitation in invitations
            .iter_mut()
            .filter(|i| i.is_pending() && i.contact == contact)
        {
            invitation.cancel(now)?;
            superseded.push(invitation.id);
        }

        let pending = InvitationTally::from_invitations(&invitations).pending;
        let mut open = registration.open_slots(pending);
        let mut reopened = false;
        if open < 1 && target_status == InvitationStatus::Expired && registration.is_finalized() {
            let competition = SeatLedger::reserve(
                tx.as_mut(),
                ReserveSeats {
                    competition_id: registration.competition_id,
                    count: 1,
                },
            )
            .await?;
            if registration.declared_size >= competition.max_team_size {
                return Err(RegistrationError::NoOpenSlots {
                    requested: 1,
                    available: 0,
                });
            }
            registration.reopen_slot(now);
            open = registration.open_slots(pending);
            reopened = true;
        }
        if open < 1 {
            return Err(RegistrationError::NoOpenSlots {
                requested: 1,
                available: open,
            });
        }

        for invitation in invitations.iter().filter(|i| superseded.contains(&i.id)) {
            tx.update_invitation(invitation).await?;
        }

        let fresh = Invitation::new(
            registration.id,
            leader.user_id,
            &contact,
            self.invitation_ttl,
            now,
        )?;
        insert_invitation(tx.as_mut(), &fresh).await?;
        invitations.push(fresh.clone());

        let mut outbox = Outbox::default();
        outbox.push(NotificationKind::Invited, &fresh, now);
        recompute_completeness(
            tx.as_mut(),
            &mut registration,
            &invitations,
            SlotPolicy::Keep,
            now,
        )
        .await?;
        tx.commit().await?;
        self.publish(outbox);

        tracing::info!(
            invitation_id = %fresh.id,
            replaces = %invitation_id,
            registration_id = %registration.id,
            reopened_slot = reopened,
            declared_size = registration.declared_size,
            "Invitation re-issued"
        );

        Ok(fresh)
    }

    /// Expire one invitation found by the sweep.
    ///
    /// Returns `false` when the invitation was resolved or re-issued in the
    /// meantime, so repeated sweeps are harmless.
    pub(crate) async fn expire_invitation(
        &self,
        invitation_id: Uuid,
        registration_id: Uuid,
    ) -> Result<bool> {
        let now = self.now();
        let mut tx = self.store.begin().await?;

        let Some(mut registration) = tx.lock_registration(registration_id).await? else {
            return Ok(false);
        };
        let mut invitations = tx.lock_invitations_for_registration(registration.id).await?;
        let Some(index) = invitations.iter().position(|i| i.id == invitation_id) else {
            return Ok(false);
        };

        let invitation = &mut invitations[index];
        if !invitation.is_pending() || !invitation.is_expired_at(now) {
            return Ok(false);
        }
        invitation.expire(now)?;
        let invitation = invitation.clone();
        tx.update_invitation(&invitation).await?;

        let mut outbox = Outbox::default();
        outbox.push(NotificationKind::Expired, &invitation, now);
        recompute_completeness(
            tx.as_mut(),
            &mut registration,
            &invitations,
            SlotPolicy::Release,
            now,
        )
        .await?;
        tx.commit().await?;
        self.publish(outbox);

        tracing::debug!(
            invitation_id = %invitation.id,
            registration_id = %registration.id,
            "Invitation expired"
        );

        Ok(true)
    }
}

/// Lock the registration owning `invitation_id`, then its invitations.
///
/// Returns the registration, its invitations and the index of the target.
async fn lock_for_invitation(
    tx: &mut dyn StoreTransaction,
    invitation_id: Uuid,
) -> Result<(Registration, Vec<Invitation>, usize)> {
    let found = tx
        .get_invitation(invitation_id)
        .await?
        .ok_or(RegistrationError::NotFound("Invitation"))?;
    let registration = tx
        .lock_registration(found.registration_id)
        .await?
        .ok_or(RegistrationError::NotFound("Registration"))?;
    let invitations = tx.lock_invitations_for_registration(registration.id).await?;
    let index = invitations
        .iter()
        .position(|i| i.id == invitation_id)
        .ok_or(RegistrationError::NotFound("Invitation"))?;
    Ok((registration, invitations, index))
}

async fn insert_invitation(tx: &mut dyn StoreTransaction, invitation: &Invitation) -> Result<()> {
    tx.insert_invitation(invitation).await.map_err(|e| match e {
        RepositoryError::AlreadyExists => RegistrationError::Validation(format!(
            "A pending invitation for {} already exists",
            invitation.contact
        )),
        other => RegistrationError::Repository(other),
    })
}

/// Cancel and persist every pending invitation; returns how many
pub(crate) async fn cancel_pending(
    tx: &mut dyn StoreTransaction,
    invitations: &mut [Invitation],
    now: DateTime<Utc>,
) -> Result<usize> {
    let mut cancelled = 0;
    for invitation in invitations.iter_mut().filter(|i| i.is_pending()) {
        invitation.cancel(now)?;
        tx.update_invitation(invitation).await?;
        cancelled += 1;
    }
    Ok(cancelled)
}

/// What happens to unfilled slots once nothing is pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotPolicy {
    /// Finalize: shrink to the filled size and release the rest
    Release,
    /// Mark complete but keep the declared size open for new invitations
    Keep,
}

/// Recompute completeness from the registration's invitations and persist it.
///
/// With nothing pending and `SlotPolicy::Release` the registration is
/// finalized, and unfilled seats are released while it still holds seats.
/// Withdrawn and rejected registrations are left untouched.
pub(crate) async fn recompute_completeness(
    tx: &mut dyn StoreTransaction,
    registration: &mut Registration,
    invitations: &[Invitation],
    policy: SlotPolicy,
    now: DateTime<Utc>,
) -> Result<InvitationTally> {
    let tally = InvitationTally::from_invitations(invitations);
    if !registration.is_active() {
        return Ok(tally);
    }

    if tally.all_resolved() && policy == SlotPolicy::Keep {
        registration.completeness = Completeness::Complete;
        registration.updated_at = now;
    } else if tally.all_resolved() {
        let holds_seats = registration.status.holds_seats();
        let unfilled = registration.finalize(now);
        if holds_seats && unfilled > 0 {
            SeatLedger::release(
                tx,
                ReleaseSeats {
                    competition_id: registration.competition_id,
                    count: unfilled,
                },
            )
            .await?;
        }
        if unfilled > 0 {
            tracing::info!(
                registration_id = %registration.id,
                released = if holds_seats { unfilled } else { 0 },
                declared_size = registration.declared_size,
                "Team finalized with fewer members than declared"
            );
        }
    } else {
        registration.completeness = Completeness::PendingInvitations;
        registration.updated_at = now;
    }

    tracing::debug!(
        registration_id = %registration.id,
        pending = tally.pending,
        accepted = tally.accepted,
        rejected = tally.rejected,
        expired = tally.expired,
        completeness = ?registration.completeness,
        "Completeness recomputed"
    );

    tx.update_registration(registration).await?;
    Ok(tally)
}
