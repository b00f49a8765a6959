//! Household and membership handlers.

use axum::{
    extract::{Path, State},
    Extension,
};
use tracing::instrument;

use crate::api::extract::{JsonBody, QueryParams};
use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::models::SessionContext;
use crate::domain::{HouseholdId, PageQuery, UserId};
use crate::households::models::{
    HouseholdCreationInput, HouseholdMembership, HouseholdOwnershipTransferInput, HouseholdUpdateInput, HouseholdView,
    ModifyMembershipInput,
};
use crate::AppState;

pub async fn create_household_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    JsonBody(input): JsonBody<HouseholdCreationInput>,
) -> ApiResult<HouseholdView> {
    Ok(ApiResponse::created(state.households.create(&session, input).await?))
}

/// Households the principal is a member of.
pub async fn list_households_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<HouseholdView>> {
    Ok(ApiResponse::page(state.households.list(&session, query).await?))
}

pub async fn current_household_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<HouseholdView> {
    Ok(ApiResponse::ok(state.households.current(&session).await?))
}

pub async fn get_household_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<HouseholdView> {
    Ok(ApiResponse::ok(state.households.get(&session, &HouseholdId::from(id.as_str())).await?))
}

pub async fn update_household_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<HouseholdUpdateInput>,
) -> ApiResult<HouseholdView> {
    Ok(ApiResponse::ok(state.households.update(&session, &HouseholdId::from(id.as_str()), patch).await?))
}

#[instrument(skip(state, session), fields(household_id = %id, user_id = %session.user_id))]
pub async fn archive_household_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.households.archive(&session, &HouseholdId::from(id.as_str())).await?;
    Ok(ApiResponse::ok(()))
}

pub async fn set_default_household_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<HouseholdMembership> {
    Ok(ApiResponse::ok(state.households.set_default(&session, &HouseholdId::from(id.as_str())).await?))
}

pub async fn transfer_ownership_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<HouseholdOwnershipTransferInput>,
) -> ApiResult<HouseholdView> {
    let household_id = HouseholdId::from(id.as_str());
    Ok(ApiResponse::ok(state.households.transfer_ownership(&session, &household_id, input).await?))
}

pub async fn remove_member_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, user_id)): Path<(String, String)>,
) -> ApiResult<()> {
    state
        .households
        .remove_member(&session, &HouseholdId::from(id.as_str()), &UserId::from(user_id.as_str()))
        .await?;
    Ok(ApiResponse::ok(()))
}

pub async fn change_member_role_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path((id, user_id)): Path<(String, String)>,
    JsonBody(input): JsonBody<ModifyMembershipInput>,
) -> ApiResult<HouseholdMembership> {
    let membership = state
        .households
        .change_role(&session, &HouseholdId::from(id.as_str()), &UserId::from(user_id.as_str()), input)
        .await?;
    Ok(ApiResponse::ok(membership))
}
