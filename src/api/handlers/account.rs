//! Per-user records: notifications and ingredient preferences.

use axum::{
    extract::{Path, State},
    Extension,
};

use crate::api::extract::{JsonBody, QueryParams};
use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::models::SessionContext;
use crate::domain::PageQuery;
use crate::notifications::{UserNotification, UserNotificationUpdateInput};
use crate::user_ingredient_preferences::models::{
    UserIngredientPreference, UserIngredientPreferenceCreationInput, UserIngredientPreferenceUpdateInput,
};
use crate::AppState;

/// Notifications only originate from the system; clients are always refused.
pub async fn create_notification_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<UserNotification> {
    Ok(ApiResponse::created(state.notifications.create_from_client(&session)?))
}

pub async fn list_notifications_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<UserNotification>> {
    Ok(ApiResponse::page(state.notifications.list(&session, query).await?))
}

pub async fn get_notification_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<UserNotification> {
    Ok(ApiResponse::ok(state.notifications.get(&session, &id).await?))
}

pub async fn update_notification_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<UserNotificationUpdateInput>,
) -> ApiResult<UserNotification> {
    Ok(ApiResponse::ok(state.notifications.update(&session, &id, patch).await?))
}

pub async fn create_preference_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    JsonBody(input): JsonBody<UserIngredientPreferenceCreationInput>,
) -> ApiResult<UserIngredientPreference> {
    Ok(ApiResponse::created(state.preferences.create(&session, input).await?))
}

pub async fn list_preferences_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<UserIngredientPreference>> {
    Ok(ApiResponse::page(state.preferences.list(&session, query).await?))
}

pub async fn get_preference_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<UserIngredientPreference> {
    Ok(ApiResponse::ok(state.preferences.get(&session, &id).await?))
}

pub async fn update_preference_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<UserIngredientPreferenceUpdateInput>,
) -> ApiResult<UserIngredientPreference> {
    Ok(ApiResponse::ok(state.preferences.update(&session, &id, patch).await?))
}

pub async fn archive_preference_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<UserIngredientPreference> {
    Ok(ApiResponse::ok(state.preferences.archive(&session, &id).await?))
}
