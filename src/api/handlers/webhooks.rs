use axum::{
    extract::{Path, State},
    Extension,
};

use crate::api::extract::{JsonBody, QueryParams};
use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::models::SessionContext;
use crate::domain::PageQuery;
use crate::webhooks::models::{Webhook, WebhookCreationInput, WebhookUpdateInput};
use crate::AppState;

pub async fn create_webhook_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    JsonBody(input): JsonBody<WebhookCreationInput>,
) -> ApiResult<Webhook> {
    Ok(ApiResponse::created(state.webhooks.create(&session, input).await?))
}

pub async fn list_webhooks_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<Webhook>> {
    Ok(ApiResponse::page(state.webhooks.list(&session, query).await?))
}

pub async fn get_webhook_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<Webhook> {
    Ok(ApiResponse::ok(state.webhooks.get(&session, &id).await?))
}

pub async fn update_webhook_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<WebhookUpdateInput>,
) -> ApiResult<Webhook> {
    Ok(ApiResponse::ok(state.webhooks.update(&session, &id, patch).await?))
}

pub async fn archive_webhook_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<Webhook> {
    Ok(ApiResponse::ok(state.webhooks.archive(&session, &id).await?))
}
