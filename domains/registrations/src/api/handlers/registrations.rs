//! Registration API handlers
//!
//! Registering, withdrawing, leader finalize, operator status changes and
//! the per-competition status view.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use roster_auth::{AuthUser, OperatorUser};
use roster_common::ValidatedJson;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::middleware::RegistrationsState;
use crate::domain::entities::{Completeness, EntryType, Registration};
use crate::domain::error::{RegistrationError, Result};
use crate::domain::state::RegistrationStatus;
use crate::service::{RegisterInput, RegistrationStatusView};

/// Request body for registering in a competition
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(rename = "type")]
    pub entry_type: EntryType,

    #[validate(length(max = 100))]
    pub team_name: Option<String>,

    /// Required for teams; individuals default to 1
    #[validate(range(min = 1))]
    pub declared_size: Option<i32>,
}

impl RegisterRequest {
    fn into_input(self) -> Result<RegisterInput> {
        let declared_size = match (self.entry_type, self.declared_size) {
            (_, Some(size)) => size,
            (EntryType::Individual, None) => 1,
            (EntryType::Team, None) => {
                return Err(RegistrationError::Validation(
                    "declaredSize is required for team entries".to_string(),
                ));
            }
        };
        Ok(RegisterInput {
            entry_type: self.entry_type,
            team_name: self.team_name,
            declared_size,
        })
    }
}

/// Request body for an operator status change
#[derive(Debug, Deserialize, Validate)]
pub struct SetStatusRequest {
    pub status: RegistrationStatus,
}

/// Response for registration operations
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub id: Uuid,
    pub competition_id: Uuid,
    pub leader_id: Uuid,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub team_name: Option<String>,
    pub declared_size: i32,
    pub member_ids: Vec<Uuid>,
    pub status: RegistrationStatus,
    pub completeness: Completeness,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl From<Registration> for RegistrationResponse {
    fn from(registration: Registration) -> Self {
        Self {
            id: registration.id,
            competition_id: registration.competition_id,
            leader_id: registration.leader_id,
            entry_type: registration.entry_type,
            team_name: registration.team_name,
            declared_size: registration.declared_size,
            member_ids: registration.member_ids,
            status: registration.status,
            completeness: registration.completeness,
            created_at: registration.created_at,
            confirmed_at: registration.confirmed_at,
        }
    }
}

/// Register for a competition
///
/// **POST /v1/competitions/{id}/register**
///
/// Reserves `declaredSize` seats and creates a pending registration in one
/// unit of work. The caller becomes the leader.
pub async fn register(
    AuthUser(auth): AuthUser,
    State(state): State<RegistrationsState>,
    Path(competition_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegistrationResponse>)> {
    let registration = state
        .service
        .register(competition_id, &auth, request.into_input()?)
        .await?;

    Ok((StatusCode::CREATED, Json(registration.into())))
}

/// **GET /v1/competitions/{id}/registration-status**
pub async fn registration_status(
    AuthUser(auth): AuthUser,
    State(state): State<RegistrationsState>,
    Path(competition_id): Path<Uuid>,
) -> Result<Json<RegistrationStatusView>> {
    let view = state
        .service
        .registration_status(competition_id, auth.user_id)
        .await?;
    Ok(Json(view))
}

/// Withdraw a registration
///
/// **POST /v1/registrations/{id}/withdraw**
///
/// Leader or operator only. Cancels pending invitations and releases every
/// seat the registration holds.
pub async fn withdraw(
    AuthUser(auth): AuthUser,
    State(state): State<RegistrationsState>,
    Path(registration_id): Path<Uuid>,
) -> Result<Json<RegistrationResponse>> {
    let registration = state.service.withdraw(registration_id, &auth).await?;
    Ok(Json(registration.into()))
}

/// Finalize a team with the members it has
///
/// **POST /v1/registrations/{id}/finalize**
pub async fn finalize(
    AuthUser(auth): AuthUser,
    State(state): State<RegistrationsState>,
    Path(registration_id): Path<Uuid>,
) -> Result<Json<RegistrationResponse>> {
    let registration = state.service.finalize(registration_id, &auth).await?;
    Ok(Json(registration.into()))
}

/// Confirm, waitlist or reject a registration
///
/// **POST /v1/registrations/{id}/status**
///
/// Operator only.
pub async fn set_status(
    OperatorUser(auth): OperatorUser,
    State(state): State<RegistrationsState>,
    Path(registration_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<SetStatusRequest>,
) -> Result<Json<RegistrationResponse>> {
    let registration = state
        .service
        .set_status(registration_id, &auth, request.status)
        .await?;
    Ok(Json(registration.into()))
}
