//! # Gateway Test Utilities
//!
//! Shared test utilities for the auth gateway.
//!
//! This crate provides:
//! - Fixed RSA test keys (`keys`)
//! - Claims builder and token signing (`TestClaims`, `TestKeypair`)
//! - A wiremock-backed JWKS endpoint (`JwksMockServer`)
//! - Server test harness (`TestGatewayServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let jwks = JwksMockServer::start().await;
//!     jwks.mount_keys(&[TestKeypair::primary()]).await;
//!     let server = TestGatewayServer::spawn(&jwks).await?;
//!
//!     let token = TestKeypair::primary().sign(&TestClaims::new());
//!     let response = reqwest::Client::new()
//!         .get(server.users_url("/me"))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod jwks_server;
pub mod keys;
pub mod server_harness;
pub mod tokens;

// Re-export commonly used items
pub use jwks_server::*;
pub use server_harness::*;
pub use tokens::*;
