//! Read-only compositions: the registration status view and the invitation
//! landing page

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::RegistrationService;
use crate::domain::entities::{
    Competition, Completeness, EntryType, Invitation, InvitationTally, Registration, UserProfile,
};
use crate::domain::error::{RegistrationError, Result};
use crate::domain::state::{InvitationStatus, RegistrationStatus};

/// Everything a participant's registration page needs for one competition
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationStatusView {
    pub competition_id: Uuid,
    pub is_registered: bool,
    pub registration: Option<RegistrationSummary>,
    pub team: Option<TeamSummary>,
    pub invitation_counts: InvitationTally,
    pub invitations: Vec<InvitationSummary>,
    pub permissions: Permissions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationSummary {
    pub id: Uuid,
    pub entry_type: EntryType,
    pub status: RegistrationStatus,
    pub team_name: Option<String>,
    pub completeness: Completeness,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    pub current_size: i32,
    /// Declared size of this entry
    pub max_size: i32,
    /// Competition-wide team size limit
    pub max_team_size: i32,
    pub open_slots: i32,
    pub leader: PublicIdentity,
    pub members: Vec<PublicIdentity>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIdentity {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationSummary {
    pub id: Uuid,
    pub contact: String,
    /// Invitee name once resolved, the contact otherwise
    pub display_name: String,
    pub status: InvitationStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub seconds_remaining: Option<i64>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub can_manage_team: bool,
    pub can_withdraw: bool,
    pub can_register_individual: bool,
    pub can_register_team: bool,
}

/// Invitation landing page: what the invitee sees before signing in
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationLanding {
    pub invitation: LandingInvitation,
    pub registration: LandingRegistration,
    pub competition: LandingCompetition,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LandingInvitation {
    pub id: Uuid,
    pub contact: String,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub seconds_remaining: Option<i64>,
    pub is_expired: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LandingRegistration {
    pub id: Uuid,
    pub team_name: Option<String>,
    pub status: RegistrationStatus,
    pub current_size: i32,
    pub max_size: i32,
    pub leader: PublicIdentity,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LandingCompetition {
    pub id: Uuid,
    pub title: String,
    pub max_team_size: i32,
    pub registration_opens_at: Option<DateTime<Utc>>,
    pub registration_closes_at: Option<DateTime<Utc>>,
}

impl RegistrationService {
    /// Compose the status view for `requester` in a competition
    pub async fn registration_status(
        &self,
        competition_id: Uuid,
        requester_id: Uuid,
    ) -> Result<RegistrationStatusView> {
        let now = self.now();
        let mut tx = self.store.begin().await?;

        let competition = tx
            .get_competition(competition_id)
            .await?
            .ok_or(RegistrationError::NotFound("Competition"))?;
        let registration = tx
            .find_active_registration_for_user(competition_id, requester_id)
            .await?;

        let (invitations, profiles) = match &registration {
            Some(registration) => {
                let invitations = tx.list_invitations(registration.id).await?;
                let mut ids = registration.member_ids.clone();
                ids.extend(invitations.iter().filter_map(|i| i.invitee_id));
                let profiles = tx.find_profiles(&ids).await?;
                (invitations, profiles)
            }
            None => (Vec::new(), Vec::new()),
        };
        // Read-only: dropping rolls back
        drop(tx);

        Ok(compose_status_view(
            &competition,
            registration.as_ref(),
            &invitations,
            &profiles,
            requester_id,
            now,
        ))
    }

    /// Compose the invitation landing page for a token
    pub async fn invitation_landing(&self, token: &str) -> Result<InvitationLanding> {
        let now = self.now();
        let mut tx = self.store.begin().await?;

        let invitation = tx
            .find_invitation_by_token(token)
            .await?
            .ok_or(RegistrationError::NotFound("Invitation"))?;
        let registration = tx
            .get_registration(invitation.registration_id)
            .await?
            .ok_or(RegistrationError::NotFound("Registration"))?;
        let competition = tx
            .get_competition(registration.competition_id)
            .await?
            .ok_or(RegistrationError::NotFound("Competition"))?;
        let profiles = tx.find_profiles(&[registration.leader_id]).await?;
        drop(tx);

        let profiles = index_profiles(&profiles);
        Ok(InvitationLanding {
            invitation: LandingInvitation {
                id: invitation.id,
                contact: invitation.contact.clone(),
                status: invitation.status,
                expires_at: invitation.expires_at,
                seconds_remaining: invitation.seconds_remaining(now),
                is_expired: invitation.status == InvitationStatus::Expired
                    || (invitation.is_pending() && invitation.is_expired_at(now)),
            },
            registration: LandingRegistration {
                id: registration.id,
                team_name: registration.team_name.clone(),
                status: registration.status,
                current_size: registration.filled_size(),
                max_size: registration.declared_size,
                leader: public_identity(registration.leader_id, &profiles),
            },
            competition: LandingCompetition {
                id: competition.id,
                title: competition.title,
                max_team_size: competition.max_team_size,
                registration_opens_at: competition.registration_opens_at,
                registration_closes_at: competition.registration_closes_at,
            },
        })
    }
}

/// Pure composition of the status view from loaded records
pub fn compose_status_view(
    competition: &Competition,
    registration: Option<&Registration>,
    invitations: &[Invitation],
    profiles: &[UserProfile],
    requester_id: Uuid,
    now: DateTime<Utc>,
) -> RegistrationStatusView {
    let window_open = competition.is_registration_open(now);
    let profiles = index_profiles(profiles);

    let Some(registration) = registration else {
        return RegistrationStatusView {
            competition_id: competition.id,
            is_registered: false,
            registration: None,
            team: None,
            invitation_counts: InvitationTally::default(),
            invitations: Vec::new(),
            permissions: Permissions {
                can_manage_team: false,
                can_withdraw: false,
                can_register_individual: window_open,
                can_register_team: window_open && competition.max_team_size >= 2,
            },
        };
    };

    let tally = InvitationTally::from_invitations(invitations);
    let is_leader = registration.is_leader(requester_id);
    let is_complete =
        tally.all_resolved() && registration.filled_size() == registration.declared_size;

    let invitations = invitations
        .iter()
        .map(|invitation| {
            let display_name = invitation
                .invitee_id
                .and_then(|id| profiles.get(&id))
                .map(|p| p.display_name.clone())
                .unwrap_or_else(|| invitation.contact.clone());
            InvitationSummary {
                id: invitation.id,
                contact: invitation.contact.clone(),
                display_name,
                status: invitation.status,
                issued_at: invitation.issued_at,
                expires_at: invitation.expires_at,
                seconds_remaining: invitation.seconds_remaining(now),
                resolved_at: invitation.resolved_at,
            }
        })
        .collect();

    RegistrationStatusView {
        competition_id: competition.id,
        is_registered: true,
        registration: Some(RegistrationSummary {
            id: registration.id,
            entry_type: registration.entry_type,
            status: registration.status,
            team_name: registration.team_name.clone(),
            completeness: registration.completeness,
            is_complete,
            created_at: registration.created_at,
            confirmed_at: registration.confirmed_at,
        }),
        team: Some(TeamSummary {
            current_size: registration.filled_size(),
            max_size: registration.declared_size,
            max_team_size: competition.max_team_size,
            open_slots: registration.open_slots(tally.pending),
            leader: public_identity(registration.leader_id, &profiles),
            members: registration
                .member_ids
                .iter()
                .map(|id| public_identity(*id, &profiles))
                .collect(),
        }),
        invitation_counts: tally,
        invitations,
        permissions: Permissions {
            can_manage_team: is_leader,
            can_withdraw: is_leader && registration.status.holds_seats(),
            can_register_individual: false,
            can_register_team: false,
        },
    }
}

fn index_profiles(profiles: &[UserProfile]) -> HashMap<Uuid, &UserProfile> {
    profiles.iter().map(|p| (p.id, p)).collect()
}

fn public_identity(id: Uuid, profiles: &HashMap<Uuid, &UserProfile>) -> PublicIdentity {
    let profile = profiles.get(&id);
    PublicIdentity {
        id,
        display_name: profile.map(|p| p.display_name.clone()),
        avatar_url: profile.and_then(|p| p.avatar_url.clone()),
    }
}
