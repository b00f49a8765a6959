//! # Configuration Management
//!
//! Layered configuration for the Larder service: built-in defaults, an optional
//! `larder.toml` file, then `LARDER__`-prefixed environment variables
//! (`LARDER__SERVER__PORT=9090`).

pub mod settings;

pub use settings::{
    AppConfig, AuthConfig, DatabaseConfig, MealPlanConfig, ObservabilityConfig, ServerConfig,
};

use crate::errors::Result;

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "larder.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "LARDER";

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, optionally from an explicit file path.
    pub fn load_from(path: Option<&str>) -> Result<Self> {
        let defaults = config::Config::try_from(&AppConfig::default())?;

        let mut builder = config::Config::builder().add_source(defaults);
        builder = match path {
            Some(path) => builder.add_source(config::File::with_name(path).required(true)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let loaded: AppConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("auth.service_admin_usernames")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = AppConfig::load_from(None).unwrap();
        assert_eq!(config.server.port, ServerConfig::default().port);
        assert_eq!(config.meal_plans.finalizer_interval_seconds, 30);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(AppConfig::load_from(Some("/nonexistent/larder-config")).is_err());
    }
}
