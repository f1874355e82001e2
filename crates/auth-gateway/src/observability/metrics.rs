//! Metrics definitions for the auth gateway.
//!
//! All metrics follow Prometheus naming conventions:
//! - `authgw_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: HTTP methods
//! - `endpoint`: the fixed set of gateway routes, everything else is `/other`
//! - `status`: success, error, timeout (or the JWKS / IdP outcome labels)
//! - `operation`: the identity provider operations
//! - `result`: token verification outcomes

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Routes below the API prefix that are reported by name.
const USER_ENDPOINTS: &[&str] = &[
    "/users",
    "/users/me",
    "/users/confirm",
    "/users/login",
    "/users/refresh",
    "/users/logout",
    "/users/forgot-password",
    "/users/confirm-forgot-password",
    "/users/resend-confirmation-code",
];

/// Install the global Prometheus recorder.
///
/// Must be called once per process; the returned handle renders `/metrics`.
///
/// # Errors
///
/// Returns a description of the failure if buckets are rejected or a
/// recorder is already installed.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("authgw_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.300, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // JWKS fetches are bounded by the fetch timeout
        .set_buckets_for_metric(
            Matcher::Prefix("authgw_jwks_fetch".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("authgw_idp_request".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set IdP request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `authgw_http_requests_total`, `authgw_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// Captures every response, including framework-level rejections (400 on
/// bad JSON, 404, 405) that never reach a handler.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("authgw_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("authgw_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize a request path to a bounded label.
///
/// The API prefix is configurable, so user routes are matched from their
/// `/users` segment onward and reported without the prefix.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" | "/ready" | "/metrics" => return path.to_string(),
        _ => {}
    }

    if let Some(idx) = path.find("/users") {
        let tail = path.get(idx..).unwrap_or_default().trim_end_matches('/');
        let tail = if tail.is_empty() { "/users" } else { tail };
        if USER_ENDPOINTS.contains(&tail) {
            return tail.to_string();
        }
    }

    "/other".to_string()
}

// ============================================================================
// JWKS Metrics
// ============================================================================

/// Record a JWKS fetch attempt
///
/// Metric: `authgw_jwks_fetch_total`, `authgw_jwks_fetch_duration_seconds`
/// Labels: `status` (success, error, timeout)
pub fn record_jwks_fetch(status: &str, duration: Duration) {
    histogram!("authgw_jwks_fetch_duration_seconds").record(duration.as_secs_f64());

    counter!("authgw_jwks_fetch_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record that a stale key set was served because a refresh failed
///
/// Metric: `authgw_jwks_stale_served_total`
pub fn record_jwks_stale_served() {
    counter!("authgw_jwks_stale_served_total").increment(1);
}

// ============================================================================
// Token Verification Metrics
// ============================================================================

/// Record a token verification outcome
///
/// Metric: `authgw_token_verifications_total`
/// Labels: `result` (success, missing, malformed, unknown_key, invalid, fetch_error)
pub fn record_token_verification(result: &str) {
    counter!("authgw_token_verifications_total",
        "result" => result.to_string()
    )
    .increment(1);
}

// ============================================================================
// Identity Provider Metrics
// ============================================================================

/// Record a call to the identity provider
///
/// Metric: `authgw_idp_requests_total`, `authgw_idp_request_duration_seconds`
/// Labels: `operation`, `status` (success or the classified error kind)
pub fn record_idp_request(operation: &str, status: &str, duration: Duration) {
    histogram!("authgw_idp_request_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("authgw_idp_requests_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================
