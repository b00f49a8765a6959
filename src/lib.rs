//! # Larder
//!
//! Control plane of a multi-tenant recipe and meal-planning HTTP API:
//! identity and sessions, household tenancy, the uniform record lifecycle,
//! and the household-scoped domains built on it.
//!
//! ## Architecture
//!
//! ```text
//! HTTP (axum) → auth middleware → services → kernel → storage (SQLite)
//!                                              ↓
//!                                  change feed → webhook worker
//! ```
//!
//! - **Kernel**: create/read/list/update/archive for every record kind, with
//!   authorization, referential checks, the audit journal and change events.
//! - **Auth**: users, TOTP, cookie sessions, PASETO bearer tokens and API clients.
//! - **Households**: memberships, roles, ownership transfer and invitations.
//! - **Meal plans**: ranked voting, deadline finalization, tasks and groceries.

pub mod api;
pub mod auth;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod households;
pub mod kernel;
pub mod meal_plans;
pub mod notifications;
pub mod observability;
pub mod recipes;
pub mod service_settings;
pub mod storage;
pub mod user_ingredient_preferences;
pub mod webhooks;

pub use api::AppState;
pub use config::AppConfig;
pub use errors::{Error, LarderError, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
        assert_eq!(APP_NAME, "larder");
    }
}
