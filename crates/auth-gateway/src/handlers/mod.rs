//! HTTP request handlers for the auth gateway.

pub mod health;
pub mod metrics;
pub mod users;

pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
