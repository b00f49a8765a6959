//! Service settings (admin-defined) and their per-user or per-household
//! configurations.

use axum::{
    extract::{Path, State},
    Extension,
};

use super::SearchQuery;
use crate::api::extract::{JsonBody, QueryParams};
use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::models::SessionContext;
use crate::domain::PageQuery;
use crate::service_settings::models::{
    ServiceSetting, ServiceSettingConfiguration, ServiceSettingConfigurationCreationInput,
    ServiceSettingConfigurationUpdateInput, ServiceSettingCreationInput, ServiceSettingUpdateInput,
};
use crate::AppState;

pub async fn create_setting_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    JsonBody(input): JsonBody<ServiceSettingCreationInput>,
) -> ApiResult<ServiceSetting> {
    Ok(ApiResponse::created(state.settings.create(&session, input).await?))
}

pub async fn list_settings_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<ServiceSetting>> {
    Ok(ApiResponse::page(state.settings.list(&session, query).await?))
}

pub async fn search_settings_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<SearchQuery>,
) -> ApiResult<Vec<ServiceSetting>> {
    Ok(ApiResponse::ok(state.settings.search(&session, &query.q, query.limit()).await?))
}

pub async fn get_setting_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<ServiceSetting> {
    Ok(ApiResponse::ok(state.settings.get(&session, &id).await?))
}

pub async fn update_setting_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<ServiceSettingUpdateInput>,
) -> ApiResult<ServiceSetting> {
    Ok(ApiResponse::ok(state.settings.update(&session, &id, patch).await?))
}

pub async fn archive_setting_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<ServiceSetting> {
    Ok(ApiResponse::ok(state.settings.archive(&session, &id).await?))
}

// Configurations

pub async fn create_configuration_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    JsonBody(input): JsonBody<ServiceSettingConfigurationCreationInput>,
) -> ApiResult<ServiceSettingConfiguration> {
    Ok(ApiResponse::created(state.settings.create_configuration(&session, input).await?))
}

pub async fn list_user_configurations_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<ServiceSettingConfiguration>> {
    Ok(ApiResponse::page(state.settings.list_user_configurations(&session, query).await?))
}

pub async fn list_household_configurations_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<ServiceSettingConfiguration>> {
    Ok(ApiResponse::page(state.settings.list_household_configurations(&session, query).await?))
}

pub async fn configuration_by_name_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(name): Path<String>,
) -> ApiResult<ServiceSettingConfiguration> {
    Ok(ApiResponse::ok(state.settings.configuration_for_setting(&session, &name).await?))
}

pub async fn get_configuration_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<ServiceSettingConfiguration> {
    Ok(ApiResponse::ok(state.settings.get_configuration(&session, &id).await?))
}

pub async fn update_configuration_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<ServiceSettingConfigurationUpdateInput>,
) -> ApiResult<ServiceSettingConfiguration> {
    Ok(ApiResponse::ok(state.settings.update_configuration(&session, &id, patch).await?))
}

pub async fn archive_configuration_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<ServiceSettingConfiguration> {
    Ok(ApiResponse::ok(state.settings.archive_configuration(&session, &id).await?))
}
