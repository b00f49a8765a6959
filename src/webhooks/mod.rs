//! Household webhooks and the worker that delivers change events to them.

pub mod delivery;
pub mod models;
pub mod service;

pub use delivery::{spawn_webhook_worker, WebhookDispatcher};
pub use models::{Webhook, WebhookMethod};
pub use service::WebhookService;
