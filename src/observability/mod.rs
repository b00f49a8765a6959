//! # Observability Infrastructure
//!
//! Structured logging, request tracing and metrics for the Larder service.

pub mod http_tracing;
pub mod logging;
pub mod metrics;

pub use http_tracing::trace_http_requests;
pub use logging::{init_logging, log_config_info};

use crate::config::ObservabilityConfig;
use crate::errors::Result;

/// Initialize logging and register metric descriptions.
pub fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    init_logging(config)?;
    metrics::describe_metrics();

    tracing::info!(
        service_name = %config.service_name,
        log_level = %config.log_level,
        json_logging = config.json_logging,
        "Observability initialized"
    );
    Ok(())
}
