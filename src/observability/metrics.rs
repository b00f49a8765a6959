//! # Metrics Collection
//!
//! Counters and histograms recorded through the `metrics` facade. No exporter
//! is installed by the service; a host process may install one.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Register metric descriptions with whichever recorder is installed.
pub fn describe_metrics() {
    describe_counter!("http_requests_total", Unit::Count, "HTTP requests served");
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request latency"
    );
    describe_counter!("users_registered_total", Unit::Count, "Accounts registered");
    describe_counter!("logins_total", Unit::Count, "Login attempts by outcome");
    describe_counter!("audit_entries_total", Unit::Count, "Audit journal entries written");
    describe_counter!("meal_plans_finalized_total", Unit::Count, "Meal plans finalized by outcome");
    describe_counter!("webhook_deliveries_total", Unit::Count, "Webhook deliveries by outcome");
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("http_request_duration_seconds", "method" => method.to_string(), "path" => path.to_string())
        .record(duration);
}

pub fn record_registration() {
    counter!("users_registered_total").increment(1);
}

pub fn record_login(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("logins_total", "outcome" => outcome).increment(1);
}

pub fn record_audit_entry(event_type: &str) {
    counter!("audit_entries_total", "event_type" => event_type.to_string()).increment(1);
}

pub fn record_meal_plan_finalized(status: &str) {
    counter!("meal_plans_finalized_total", "status" => status.to_string()).increment(1);
}

pub fn record_webhook_delivery(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("webhook_deliveries_total", "outcome" => outcome).increment(1);
}

/// Collapse identifiers in a path so labels stay low-cardinality.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let looks_like_id = segment.len() >= 16
                && segment.chars().all(|c| c.is_ascii_hexdigit() || c == '-');
            if looks_like_id {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/recipes/0190f3a4-7c1e-7b8a-9d2e-1234567890ab/steps"),
            "/recipes/:id/steps"
        );
        assert_eq!(normalize_path("/users/login"), "/users/login");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        describe_metrics();
        record_http_request("GET", "/webhooks", 200, 0.01);
        record_login(false);
        record_meal_plan_finalized("finalized");
    }
}
