//! Observability for the auth gateway.
//!
//! Provides the Prometheus recorder and the metric definitions recorded by
//! the auth core, the identity provider client and the HTTP layer.

pub mod metrics;
