//! Invitation API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use roster_auth::AuthUser;
use roster_common::ValidatedJson;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::registrations::RegistrationResponse;
use crate::api::middleware::RegistrationsState;
use crate::domain::commands::{InvitationAction, ResolveInvitation};
use crate::domain::entities::Invitation;
use crate::domain::error::Result;
use crate::domain::state::InvitationStatus;
use crate::service::InvitationLanding;

/// Request body for inviting teammates
#[derive(Debug, Deserialize, Validate)]
pub struct InviteRequest {
    #[validate(length(min = 1, max = 20))]
    pub contacts: Vec<String>,
}

/// Request body for answering an invitation
#[derive(Debug, Deserialize, Validate)]
pub struct RespondRequest {
    pub action: InvitationAction,
}

/// Invitation as returned to the team leader
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationResponse {
    pub id: Uuid,
    pub registration_id: Uuid,
    pub contact: String,
    pub status: InvitationStatus,
    pub invitee_id: Option<Uuid>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Only present on freshly issued invitations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl InvitationResponse {
    /// Response for a newly issued invitation, token included
    fn issued(invitation: Invitation) -> Self {
        let token = invitation.token.clone();
        Self {
            token: Some(token),
            ..Self::from(invitation)
        }
    }
}

impl From<Invitation> for InvitationResponse {
    fn from(invitation: Invitation) -> Self {
        Self {
            id: invitation.id,
            registration_id: invitation.registration_id,
            contact: invitation.contact,
            status: invitation.status,
            invitee_id: invitation.invitee_id,
            issued_at: invitation.issued_at,
            expires_at: invitation.expires_at,
            resolved_at: invitation.resolved_at,
            token: None,
        }
    }
}

/// Response for an invitation response: the invitation and the team it
/// belongs to after the change
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondResponse {
    pub invitation: InvitationResponse,
    pub registration: RegistrationResponse,
}

/// Invite teammates by e-mail
///
/// **POST /v1/registrations/{id}/invitations**
///
/// Leader only. The batch either fits in the open slots or fails whole.
pub async fn invite(
    AuthUser(auth): AuthUser,
    State(state): State<RegistrationsState>,
    Path(registration_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<InviteRequest>,
) -> Result<(StatusCode, Json<Vec<InvitationResponse>>)> {
    let invitations = state
        .service
        .invite(registration_id, &auth, &request.contacts)
        .await?;

    let body = invitations
        .into_iter()
        .map(InvitationResponse::issued)
        .collect();
    Ok((StatusCode::CREATED, Json(body)))
}

/// Invitation landing page data
///
/// **GET /v1/invitations/{token}**
///
/// Public: the token is the credential.
pub async fn landing(
    State(state): State<RegistrationsState>,
    Path(token): Path<String>,
) -> Result<Json<InvitationLanding>> {
    let landing = state.service.invitation_landing(&token).await?;
    Ok(Json(landing))
}

/// Accept or reject an invitation
///
/// **POST /v1/invitations/{token}/respond**
pub async fn respond(
    AuthUser(auth): AuthUser,
    State(state): State<RegistrationsState>,
    Path(token): Path<String>,
    ValidatedJson(request): ValidatedJson<RespondRequest>,
) -> Result<Json<RespondResponse>> {
    let (invitation, registration) = state
        .service
        .respond(ResolveInvitation {
            token,
            action: request.action,
            responder_id: auth.user_id,
        })
        .await?;

    Ok(Json(RespondResponse {
        invitation: invitation.into(),
        registration: registration.into(),
    }))
}

/// **DELETE /v1/invitations/{id}**
pub async fn cancel(
    AuthUser(auth): AuthUser,
    State(state): State<RegistrationsState>,
    Path(invitation_id): Path<Uuid>,
) -> Result<Json<InvitationResponse>> {
    let invitation = state
        .service
        .cancel_invitation(invitation_id, &auth)
        .await?;
    Ok(Json(invitation.into()))
}

/// Re-issue an invitation with a fresh token
///
/// **POST /v1/invitations/{id}/resend**
pub async fn resend(
    AuthUser(auth): AuthUser,
    State(state): State<RegistrationsState>,
    Path(invitation_id): Path<Uuid>,
) -> Result<(StatusCode, Json<InvitationResponse>)> {
    let invitation = state
        .service
        .resend_invitation(invitation_id, &auth)
        .await?;
    Ok((StatusCode::CREATED, Json(InvitationResponse::issued(invitation))))
}
