use axum::{
    extract::{Path, State},
    Extension,
};

use super::SearchQuery;
use crate::api::extract::{JsonBody, QueryParams};
use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::models::SessionContext;
use crate::auth::user::{UserReputationUpdateInput, UserView};
use crate::domain::{PageQuery, UserId};
use crate::AppState;

pub async fn get_self_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> ApiResult<UserView> {
    Ok(ApiResponse::ok(state.users.get_self(&session).await?))
}

pub async fn get_user_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(user_id): Path<String>,
) -> ApiResult<UserView> {
    Ok(ApiResponse::ok(state.users.get(&session, &UserId::from(user_id.as_str())).await?))
}

pub async fn archive_user_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(user_id): Path<String>,
) -> ApiResult<()> {
    state.users.archive(&session, &UserId::from(user_id.as_str())).await?;
    Ok(ApiResponse::ok(()))
}

/// Service admins only.
pub async fn list_users_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<UserView>> {
    Ok(ApiResponse::page(state.users.list(&session, query).await?))
}

/// Service admins only.
pub async fn search_users_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(query): QueryParams<SearchQuery>,
) -> ApiResult<Vec<UserView>> {
    Ok(ApiResponse::ok(state.users.search(&session, &query.q, query.limit()).await?))
}

pub async fn update_reputation_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    JsonBody(input): JsonBody<UserReputationUpdateInput>,
) -> ApiResult<()> {
    state.users.update_reputation(&session, input).await?;
    Ok(ApiResponse::ok(()))
}
