//! Authentication and authorization.
//!
//! Identity (users, passwords, TOTP), the session layer (cookie sessions,
//! PASETO bearer tokens, API clients), the request middleware and the
//! authorization evaluator every service consults.

pub mod api_client;
pub mod authorization;
pub mod cleanup;
pub mod hashing;
pub mod middleware;
pub mod models;
pub mod session;
pub mod token_service;
pub mod totp;
pub mod user;
pub mod user_service;

pub use api_client::ApiClientService;
pub use authorization::{authorize, authorize_household, require_service_admin, Action, Owner};
pub use cleanup::{spawn_cleanup, CleanupService};
pub use models::{HouseholdRole, Reputation, ServiceRole, SessionContext};
pub use session::SessionService;
pub use token_service::TokenService;
pub use user::User;
pub use user_service::UserService;
