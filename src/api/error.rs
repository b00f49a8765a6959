//! HTTP rendering of [`LarderError`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::errors::{ErrorCode, LarderError};

/// Error returned by every handler; renders `{ "error": { "code", "message" } }`.
#[derive(Debug)]
pub struct ApiError(pub LarderError);

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        self.0.code()
    }

    fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn message(&self) -> String {
        match &self.0 {
            LarderError::Validation { message, .. } => message.clone(),
            LarderError::Auth { message, .. } => message.clone(),
            LarderError::Forbidden { message } => message.clone(),
            LarderError::Conflict { message, .. } => message.clone(),
            LarderError::NotFound { resource_type, .. } => format!("{resource_type} not found"),
            LarderError::Serialization { .. } => "request body could not be decoded".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = if code == ErrorCode::Internal {
            let correlation_id = uuid::Uuid::new_v4();
            error!(%correlation_id, error = ?self.0, "internal error while handling request");
            format!("an internal error occurred (correlation id {correlation_id})")
        } else {
            if code == ErrorCode::DeadlineExceeded {
                warn!(error = %self.0, "request deadline exceeded");
            }
            self.message()
        };

        (status, Json(ErrorBody { error: ErrorDetail { code: code.as_str(), message } })).into_response()
    }
}

impl From<LarderError> for ApiError {
    fn from(err: LarderError) -> Self {
        ApiError(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AuthErrorType;
    use axum::body::to_bytes;

    async fn render(err: LarderError) -> (StatusCode, serde_json::Value) {
        let response = ApiError::from(err).into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn codes_and_statuses() {
        let (status, body) = render(LarderError::not_found("webhook", "w1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "notFound");
        assert_eq!(body["error"]["message"], "webhook not found");

        let (status, body) = render(LarderError::auth("bad", AuthErrorType::InvalidCredentials)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "unauthenticated");

        let (status, body) = render(LarderError::validation_field("rank is required", "rank")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "rank is required");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) = render(LarderError::internal("disk on fire")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "internal");
        let message = body["error"]["message"].as_str().unwrap();
        assert!(!message.contains("disk"));
        assert!(message.contains("correlation id"));
    }
}
