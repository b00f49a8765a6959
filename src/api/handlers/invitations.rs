//! Invitation handlers. Creation lives under the household it invites to.

use axum::{
    extract::{Path, State},
    Extension,
};

use crate::api::extract::{JsonBody, QueryParams};
use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::models::SessionContext;
use crate::domain::{HouseholdId, PageQuery};
use crate::households::invitations::{
    HouseholdInvitation, HouseholdInvitationCancelInput, HouseholdInvitationCreationInput,
    HouseholdInvitationResponseInput,
};
use crate::AppState;

pub async fn create_invitation_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(household_id): Path<String>,
    JsonBody(input): JsonBody<HouseholdInvitationCreationInput>,
) -> ApiResult<HouseholdInvitation> {
    let household_id = HouseholdId::from(household_id.as_str());
    Ok(ApiResponse::created(state.invitations.create(&session, &household_id, input).await?))
}

pub async fn list_sent_invitations_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<HouseholdInvitation>> {
    Ok(ApiResponse::page(state.invitations.list_sent(&session, query).await?))
}

pub async fn list_received_invitations_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<HouseholdInvitation>> {
    Ok(ApiResponse::page(state.invitations.list_received(&session, query).await?))
}

pub async fn get_invitation_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<HouseholdInvitation> {
    Ok(ApiResponse::ok(state.invitations.get(&session, &id).await?))
}

pub async fn accept_invitation_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<HouseholdInvitationResponseInput>,
) -> ApiResult<HouseholdInvitation> {
    Ok(ApiResponse::ok(state.invitations.accept(&session, &id, input).await?))
}

pub async fn reject_invitation_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<HouseholdInvitationResponseInput>,
) -> ApiResult<HouseholdInvitation> {
    Ok(ApiResponse::ok(state.invitations.reject(&session, &id, input).await?))
}

pub async fn cancel_invitation_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<HouseholdInvitationCancelInput>,
) -> ApiResult<HouseholdInvitation> {
    Ok(ApiResponse::ok(state.invitations.cancel(&session, &id, input).await?))
}
