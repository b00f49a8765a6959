//! # Error Types
//!
//! Error taxonomy for the Larder service using `thiserror`.
//!
//! Low-level persistence and serialization failures are translated into this
//! taxonomy at the storage boundary, so everything above `storage` reasons in
//! terms of [`ErrorCode`] rather than driver errors.

use std::fmt;

use serde::Serialize;

/// Custom result type for Larder operations
pub type Result<T> = std::result::Result<T, LarderError>;

/// Main error type for the Larder service
#[derive(thiserror::Error, Debug)]
pub enum LarderError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database and storage errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// Authentication errors
    #[error("Authentication error: {message}")]
    Auth { message: String, error_type: AuthErrorType },

    /// The principal is known but lacks the capability for an unambiguous operation
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// Resource not found errors (also used for out-of-tenant and archived records)
    #[error("Resource not found: {resource_type} with ID '{id}'")]
    NotFound { resource_type: String, id: String },

    /// Resource conflict errors (uniqueness, archived references, state machine)
    #[error("Resource conflict: {message}")]
    Conflict { message: String, resource_type: String },

    /// The operation's deadline elapsed before it completed
    #[error("Deadline exceeded: {operation} after {duration_ms}ms")]
    DeadlineExceeded { operation: String, duration_ms: u64 },

    /// Internal server errors
    #[error("Internal server error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Authentication error subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorType {
    InvalidCredentials,
    MissingCredentials,
    InvalidToken,
    ExpiredToken,
    UnverifiedTwoFactor,
    AccountSuspended,
}

impl fmt::Display for AuthErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthErrorType::InvalidCredentials => write!(f, "invalid_credentials"),
            AuthErrorType::MissingCredentials => write!(f, "missing_credentials"),
            AuthErrorType::InvalidToken => write!(f, "invalid_token"),
            AuthErrorType::ExpiredToken => write!(f, "expired_token"),
            AuthErrorType::UnverifiedTwoFactor => write!(f, "unverified_two_factor"),
            AuthErrorType::AccountSuspended => write!(f, "account_suspended"),
        }
    }
}

/// User-visible error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    BadRequest,
    Unauthenticated,
    Forbidden,
    NotFound,
    Conflict,
    DeadlineExceeded,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "badRequest",
            ErrorCode::Unauthenticated => "unauthenticated",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::NotFound => "notFound",
            ErrorCode::Conflict => "conflict",
            ErrorCode::DeadlineExceeded => "deadlineExceeded",
            ErrorCode::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LarderError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create an authentication error
    pub fn auth<S: Into<String>>(message: S, error_type: AuthErrorType) -> Self {
        Self::Auth { message: message.into(), error_type }
    }

    /// Uniform credential failure; never reveals which part was wrong.
    pub fn invalid_credentials() -> Self {
        Self::auth("invalid credentials", AuthErrorType::InvalidCredentials)
    }

    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::Forbidden { message: message.into() }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Create a conflict error
    pub fn conflict<M: Into<String>, R: Into<String>>(message: M, resource_type: R) -> Self {
        Self::Conflict { message: message.into(), resource_type: resource_type.into() }
    }

    pub fn deadline_exceeded<S: Into<String>>(operation: S, duration_ms: u64) -> Self {
        Self::DeadlineExceeded { operation: operation.into(), duration_ms }
    }

    /// Create an internal server error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Wrap a sqlx error with context, translating constraint violations.
    pub fn database<S: Into<String>>(source: sqlx::Error, context: S) -> Self {
        let context = context.into();
        if let sqlx::Error::Database(db_err) = &source {
            if db_err.is_unique_violation() {
                return Self::conflict(format!("{}: record already exists", context), "record");
            }
        }
        Self::Database { source, context }
    }

    /// Add context to an error
    pub(crate) fn add_context(&mut self, context: String) {
        match self {
            LarderError::Database { context: ref mut ctx, .. }
            | LarderError::Serialization { context: ref mut ctx, .. } => {
                *ctx = format!("{}: {}", context, ctx);
            }
            LarderError::Internal { message, .. } => {
                *message = format!("{}: {}", context, message);
            }
            _ => {}
        }
    }

    /// User-visible code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            LarderError::Validation { .. } | LarderError::Serialization { .. } => {
                ErrorCode::BadRequest
            }
            LarderError::Auth { .. } => ErrorCode::Unauthenticated,
            LarderError::Forbidden { .. } => ErrorCode::Forbidden,
            LarderError::NotFound { .. } => ErrorCode::NotFound,
            LarderError::Conflict { .. } => ErrorCode::Conflict,
            LarderError::DeadlineExceeded { .. } => ErrorCode::DeadlineExceeded,
            LarderError::Config { .. }
            | LarderError::Database { .. }
            | LarderError::Internal { .. } => ErrorCode::Internal,
        }
    }

    /// Get the HTTP status code that should be returned for this error
    pub fn status_code(&self) -> u16 {
        match self.code() {
            ErrorCode::BadRequest => 400,
            ErrorCode::Unauthenticated => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::Conflict => 409,
            ErrorCode::DeadlineExceeded => 504,
            ErrorCode::Internal => 500,
        }
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, LarderError::Database { .. } | LarderError::DeadlineExceeded { .. })
    }
}

impl From<sqlx::Error> for LarderError {
    fn from(error: sqlx::Error) -> Self {
        Self::database(error, "Database operation failed")
    }
}

impl From<serde_json::Error> for LarderError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<config::ConfigError> for LarderError {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<std::io::Error> for LarderError {
    fn from(error: std::io::Error) -> Self {
        Self::Internal { message: "I/O operation failed".to_string(), source: Some(Box::new(error)) }
    }
}

impl From<validator::ValidationErrors> for LarderError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        let message = fields
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or_else(|| e.code.to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        let field = fields.first().map(|(field, _)| field.to_string());
        Self::Validation { message: format!("Validation failed: {}", message), field }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = LarderError::config("Test configuration error");
        assert!(matches!(error, LarderError::Config { .. }));
        assert_eq!(error.to_string(), "Configuration error: Test configuration error");
    }

    #[test]
    fn test_validation_error() {
        let error = LarderError::validation_field("Invalid email format", "emailAddress");
        if let LarderError::Validation { field, .. } = error {
            assert_eq!(field, Some("emailAddress".to_string()));
        } else {
            panic!("expected validation error");
        }
    }

    #[test]
    fn test_codes_and_status() {
        assert_eq!(LarderError::validation("x").code(), ErrorCode::BadRequest);
        assert_eq!(LarderError::invalid_credentials().status_code(), 401);
        assert_eq!(LarderError::forbidden("admins only").status_code(), 403);
        assert_eq!(LarderError::not_found("webhook", "w1").status_code(), 404);
        assert_eq!(LarderError::conflict("dup", "user").status_code(), 409);
        assert_eq!(LarderError::deadline_exceeded("request", 10).status_code(), 504);
        assert_eq!(LarderError::internal("boom").code(), ErrorCode::Internal);
    }

    #[test]
    fn test_code_strings() {
        assert_eq!(ErrorCode::BadRequest.as_str(), "badRequest");
        assert_eq!(ErrorCode::Unauthenticated.to_string(), "unauthenticated");
        assert_eq!(
            serde_json::to_value(ErrorCode::DeadlineExceeded).unwrap(),
            serde_json::json!("deadlineExceeded")
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(LarderError::deadline_exceeded("request", 1000).is_retryable());
        assert!(!LarderError::validation("test").is_retryable());
        assert!(!LarderError::not_found("recipe", "test").is_retryable());
    }

    #[test]
    fn test_serde_error_is_bad_request() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error: LarderError = json_error.into();
        assert_eq!(error.code(), ErrorCode::BadRequest);
    }

    #[test]
    fn test_add_context() {
        let mut error = LarderError::internal("disk full");
        error.add_context("writing audit entry".to_string());
        assert_eq!(error.to_string(), "Internal server error: writing audit entry: disk full");
    }
}
