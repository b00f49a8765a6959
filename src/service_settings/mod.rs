//! Admin-defined settings and the values users and households choose for them.

pub mod models;
pub mod service;

pub use models::{ServiceSetting, ServiceSettingConfiguration, SettingType};
pub use service::ServiceSettingService;
