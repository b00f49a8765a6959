//! # Configuration Settings
//!
//! Defines the configuration structure for the Larder service.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{LarderError, Result};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server configuration
    #[validate(nested)]
    pub server: ServerConfig,

    /// Database configuration
    #[validate(nested)]
    pub database: DatabaseConfig,

    /// Authentication and session configuration
    #[validate(nested)]
    pub auth: AuthConfig,

    /// Meal plan background processing
    #[validate(nested)]
    pub meal_plans: MealPlanConfig,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(LarderError::from)?;
        self.validate_custom()
    }

    /// Checks the validator derive cannot express
    fn validate_custom(&self) -> Result<()> {
        if !self.database.url.starts_with("sqlite:") {
            return Err(LarderError::validation("Database URL must start with 'sqlite:'"));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(LarderError::validation(
                "min_connections cannot be greater than max_connections",
            ));
        }

        if let Some(key) = &self.auth.paseto_local_key {
            if decode_local_key(key).is_none() {
                return Err(LarderError::validation(
                    "auth.paseto_local_key must be 32 bytes encoded as 64 hex characters",
                ));
            }
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    #[validate(length(min = 1, message = "Host cannot be empty"))]
    pub host: String,

    /// Server port
    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Per-request deadline in seconds
    #[validate(range(min = 1, max = 300, message = "Timeout must be between 1 and 300 seconds"))]
    pub request_timeout_seconds: u64,

    /// Maximum request body size in bytes
    #[validate(range(min = 1024, message = "Max body size must be at least 1KB"))]
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_seconds: 30,
            max_body_size: 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Get the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the request deadline as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database URL (sqlite only)
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    /// Maximum number of connections in the pool
    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(min = 1, max = 60, message = "Connect timeout must be between 1 and 60"))]
    pub connect_timeout_seconds: u64,

    /// Idle timeout in seconds (0 disables)
    pub idle_timeout_seconds: u64,

    /// Run embedded migrations at startup
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/larder.db".to_string(),
            max_connections: 8,
            min_connections: 1,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_seconds > 0).then(|| Duration::from_secs(self.idle_timeout_seconds))
    }

    /// In-memory databases exist once per connection.
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// Authentication, session and token configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AuthConfig {
    /// Session cookie name
    #[validate(length(min = 1, max = 64, message = "Cookie name must be 1-64 characters"))]
    pub cookie_name: String,

    /// Optional cookie domain
    pub cookie_domain: Option<String>,

    /// Mark the session cookie `Secure`
    pub cookie_secure: bool,

    /// Cookie session lifetime in hours
    #[validate(range(min = 1, max = 8760, message = "Session lifetime must be 1-8760 hours"))]
    pub session_lifetime_hours: i64,

    /// Bearer token lifetime in minutes
    #[validate(range(min = 1, max = 1440, message = "Token lifetime must be 1-1440 minutes"))]
    pub token_lifetime_minutes: i64,

    /// PASETO v4.local key, hex encoded. Generated at startup when absent.
    pub paseto_local_key: Option<String>,

    /// Invitation lifetime in hours
    #[validate(range(min = 1, max = 8760, message = "Invitation lifetime must be 1-8760 hours"))]
    pub invitation_lifetime_hours: i64,

    /// Usernames registered with the service admin role
    pub service_admin_usernames: Vec<String>,

    /// Allowed skew for signed API-client token requests
    #[validate(range(min = 1, max = 3600, message = "Request time threshold must be 1-3600s"))]
    pub request_time_threshold_seconds: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "larder_session".to_string(),
            cookie_domain: None,
            cookie_secure: true,
            session_lifetime_hours: 24,
            token_lifetime_minutes: 60,
            paseto_local_key: None,
            invitation_lifetime_hours: 24 * 7,
            service_admin_usernames: Vec::new(),
            request_time_threshold_seconds: 120,
        }
    }
}

impl AuthConfig {
    pub fn session_lifetime(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_lifetime_hours)
    }

    pub fn token_lifetime(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.token_lifetime_minutes)
    }

    pub fn invitation_lifetime(&self) -> chrono::Duration {
        chrono::Duration::hours(self.invitation_lifetime_hours)
    }

    pub fn request_time_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.request_time_threshold_seconds)
    }

    pub fn is_service_admin(&self, username: &str) -> bool {
        self.service_admin_usernames.iter().any(|candidate| candidate == username)
    }

    /// Decoded PASETO key bytes, if configured.
    pub fn local_key_bytes(&self) -> Option<[u8; 32]> {
        self.paseto_local_key.as_deref().and_then(decode_local_key)
    }
}

fn decode_local_key(value: &str) -> Option<[u8; 32]> {
    let bytes = hex::decode(value.trim()).ok()?;
    bytes.try_into().ok()
}

/// Meal plan background processing
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MealPlanConfig {
    /// How often the deadline sweeper looks for expired votes
    #[validate(range(min = 1, max = 3600, message = "Finalizer interval must be 1-3600 seconds"))]
    pub finalizer_interval_seconds: u64,
}

impl Default for MealPlanConfig {
    fn default() -> Self {
        Self { finalizer_interval_seconds: 30 }
    }
}

impl MealPlanConfig {
    pub fn finalizer_interval(&self) -> Duration {
        Duration::from_secs(self.finalizer_interval_seconds)
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter when `RUST_LOG` is unset
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Emit JSON formatted logs
    pub json_logging: bool,

    /// Service name attached to startup logs
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logging: false,
            service_name: "larder".to_string(),
        }
    }
}
