use axum::{
    extract::{Path, State},
    Extension,
};
use tracing::instrument;

use crate::api::extract::{JsonBody, QueryParams};
use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::api_client::{ApiClientCreationInput, ApiClientCreationResponse, ApiClientView};
use crate::auth::models::SessionContext;
use crate::domain::PageQuery;
use crate::AppState;

/// Create a client credential. The secret is only ever returned here.
#[instrument(skip(state, session, input), fields(user_id = %session.user_id))]
pub async fn create_api_client_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    JsonBody(input): JsonBody<ApiClientCreationInput>,
) -> ApiResult<ApiClientCreationResponse> {
    Ok(ApiResponse::created(state.api_clients.create(&session, input).await?))
}

pub async fn list_api_clients_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<ApiClientView>> {
    Ok(ApiResponse::page(state.api_clients.list(&session, query).await?))
}

pub async fn get_api_client_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<ApiClientView> {
    Ok(ApiResponse::ok(state.api_clients.get(&session, &id).await?))
}

pub async fn archive_api_client_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.api_clients.archive(&session, &id).await?;
    Ok(ApiResponse::ok(()))
}
