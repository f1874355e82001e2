//! Auth Gateway Library
//!
//! A thin HTTP façade over a Cognito user pool: account signup,
//! confirmation, login, token refresh, password reset, profile update,
//! deletion and logout, plus bearer-token verification against the pool's
//! published signing keys.
//!
//! # Architecture
//!
//! The gateway follows the Handler -> Service -> Provider pattern:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/user_service.rs -> services/cognito.rs
//! ```
//!
//! Protected routes pass through the auth middleware, which runs the token
//! through `auth::AuthGate` (see the `auth` module for the verification
//! pipeline).
//!
//! # Modules
//!
//! - `auth` - JWKS key cache and token verification
//! - `config` - Service configuration from environment
//! - `cookies` - Auth cookie construction and parsing
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and HTTP metrics middleware
//! - `models` - Request and response bodies
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `services` - Identity provider and account operations

pub mod auth;
pub mod config;
pub mod cookies;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
