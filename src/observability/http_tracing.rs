//! # HTTP Request Tracing Middleware
//!
//! Axum middleware that wraps every request in a `http_request` span and
//! records latency and status once the response is produced.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::Instrument;

use super::metrics::{normalize_path, record_http_request};

pub async fn trace_http_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let span = crate::request_span!(method, path);
    let start = Instant::now();

    let response = next.run(request).instrument(span.clone()).await;

    let status = response.status().as_u16();
    let elapsed = start.elapsed();
    span.in_scope(|| {
        if status >= 500 {
            tracing::error!(status, elapsed_ms = elapsed.as_millis() as u64, "request failed");
        } else {
            tracing::info!(status, elapsed_ms = elapsed.as_millis() as u64, "request completed");
        }
    });

    record_http_request(&method, &normalize_path(&path), status, elapsed.as_secs_f64());
    response
}
