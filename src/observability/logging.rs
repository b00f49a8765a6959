//! # Structured Logging
//!
//! Provides structured logging macros and subscriber initialisation using the
//! tracing ecosystem.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::errors::{LarderError, Result};

/// Create a tracing span for request tracking.
///
/// Supports optional `user_id` and `household_id` fields for tenant-aware tracing:
///
/// ```rust,ignore
/// let span = request_span!("GET", "/webhooks", user_id = "u-1", household_id = "h-1");
/// ```
#[macro_export]
macro_rules! request_span {
    ($method:expr, $path:expr) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            user_id = tracing::field::Empty,
            household_id = tracing::field::Empty
        )
    };
    ($method:expr, $path:expr, user_id = $user:expr, household_id = $household:expr) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            user_id = $user,
            household_id = $household
        )
    };
}

/// Create a tracing span for database operations.
#[macro_export]
macro_rules! db_span {
    ($operation:expr) => {
        tracing::debug_span!(
            "db_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "db_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `observability.log_level` when both are present.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|err| LarderError::config(format!("Invalid log filter: {}", err)))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json_logging {
        registry.with(fmt::layer().json().with_current_span(true).with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    result.map_err(|err| LarderError::config(format!("Failed to install subscriber: {}", err)))
}

/// Log configuration at startup
pub fn log_config_info(config: &crate::config::AppConfig) {
    tracing::info!(
        service_name = %config.observability.service_name,
        server_address = %config.server.bind_address(),
        database_in_memory = config.database.is_in_memory(),
        cookie_name = %config.auth.cookie_name,
        service_admins = config.auth.service_admin_usernames.len(),
        finalizer_interval_seconds = config.meal_plans.finalizer_interval_seconds,
        "Larder configuration"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_compile() {
        let _span = request_span!("GET", "/webhooks");
        let _span = request_span!("GET", "/webhooks", user_id = "u-1", household_id = "h-1");
        let _span = db_span!("insert_record");
        let _span = db_span!("insert_record", kind = "webhook");
    }

    #[test]
    fn test_log_config_info() {
        let config = crate::config::AppConfig::default();
        log_config_info(&config);
    }
}
