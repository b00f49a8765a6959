//! Per-user ingredient likes, dislikes and allergies.

pub mod models;
pub mod service;

pub use models::UserIngredientPreference;
pub use service::UserIngredientPreferenceService;
