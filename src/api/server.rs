use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::errors::{LarderError, Result};
use crate::AppState;

use super::routes::build_router;

/// Bind `server.host:server.port` and serve until ctrl-c.
pub async fn start_api_server(state: AppState) -> Result<()> {
    let addr: SocketAddr = state
        .config
        .server
        .bind_address()
        .parse()
        .map_err(|e| LarderError::config(format!("Invalid API address: {}", e)))?;

    let router = build_router(state);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| LarderError::internal(format!("Failed to bind API server: {}", e)))?;

    info!(address = %addr, "Starting HTTP API server");
    run_http_server(listener, router).await?;
    info!("API server shutdown completed");
    Ok(())
}

async fn run_http_server(listener: TcpListener, router: Router) -> Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "API server shutdown listener failed");
            }
        })
        .await
        .map_err(|e| LarderError::internal(format!("API server error: {}", e)))
}
