//! Admin-only access to the change journal.

use axum::{extract::State, Extension};
use tracing::instrument;

use crate::api::extract::QueryParams;
use crate::api::response::{ApiResponse, ApiResult};
use crate::auth::{models::SessionContext, require_service_admin};
use crate::domain::{Page, PageQuery};
use crate::storage::audit_log::{self, AuditFilter, AuditLogEntry};
use crate::AppState;

/// List journal entries, newest first, optionally narrowed by event type,
/// actor or resource.
///
/// **Service admins only.**
#[instrument(skip(state, session), fields(user_id = %session.user_id))]
pub async fn list_audit_logs_handler(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    QueryParams(filter): QueryParams<AuditFilter>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Vec<AuditLogEntry>> {
    require_service_admin(&session)?;

    let mut conn = state.kernel.db().read().await?;
    let (entries, filtered_count, total_count) = audit_log::list(&mut conn, &filter, &query).await?;
    Ok(ApiResponse::page(Page::new(entries, &query, filtered_count, total_count)))
}
