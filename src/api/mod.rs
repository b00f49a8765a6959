//! # REST API Components
//!
//! HTTP routing, middleware, the response envelope and request handlers for
//! the Larder service.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use response::{ApiResponse, ApiResult};
pub use routes::build_router;
pub use server::start_api_server;
pub use state::AppState;
