//! HTTP middleware for the auth gateway.
//!
//! # Components
//!
//! - `auth` - Token authentication for protected routes
//! - `http_metrics` - HTTP request metrics

pub mod auth;
pub mod http_metrics;

pub use auth::{require_auth, require_session, AccessToken, AuthState};
pub use http_metrics::http_metrics_middleware;
