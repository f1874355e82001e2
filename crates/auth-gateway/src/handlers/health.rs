//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns OK if the process is running
//! - `/ready`: Readiness probe - checks that signing keys can be obtained

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness probe handler.
///
/// Does NOT check any dependencies; failure means the process is hung.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Returns 200 when the key cache can produce a key set (fresh, refreshed or
/// within its stale window), 503 otherwise. A fresh cache answers without a
/// network call.
///
/// Error messages are generic; the actual error is logged.
#[tracing::instrument(skip_all, name = "authgw.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.key_cache.get_key_set().await {
        Ok(key_set) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                jwks: "available",
                keys: Some(key_set.len()),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(target: "authgw.health", error = %e, "Readiness check failed: JWKS unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    jwks: "unavailable",
                    keys: None,
                    error: Some("Service dependencies unavailable".to_string()),
                }),
            )
        }
    }
}
