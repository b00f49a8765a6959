//! HTTP request handlers organized by resource type

pub mod account;
pub mod api_clients;
pub mod audit_log;
pub mod auth;
pub mod catalog;
pub mod health;
pub mod households;
pub mod invitations;
pub mod meal_plans;
pub mod recipes;
pub mod settings;
pub mod users;
pub mod webhooks;

use serde::Deserialize;

use crate::domain::pagination::{DEFAULT_LIMIT, MAX_LIMIT};

/// `?q=...&limit=...` for search endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<u32>,
}

impl SearchQuery {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}
