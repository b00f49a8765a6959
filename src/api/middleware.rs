//! Router-wide request middleware.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::error::ApiError;
use crate::errors::LarderError;
use crate::AppState;

/// Fail requests that outlive `server.request_timeout_seconds` with
/// `deadlineExceeded`. Work already committed stays committed.
pub async fn enforce_deadline(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let timeout = state.config.server.request_timeout();
    let operation = format!("{} {}", request.method(), request.uri().path());

    match tokio::time::timeout(timeout, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            let duration_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            ApiError(LarderError::deadline_exceeded(operation, duration_ms)).into_response()
        }
    }
}
