//! Token verification against the identity provider's published keys.
//!
//! The pieces are layered, each owning one concern:
//!
//! ```text
//! AuthGate -> TokenVerifier -> KeyResolver -> KeyCache -> JwksFetcher
//! ```
//!
//! The cache is built once at startup and shared by `Arc`; nothing below the
//! gate knows about HTTP.

pub mod claims;
pub mod clock;
pub mod error;
pub mod gate;
pub mod jwks;
pub mod jwt;
pub mod resolver;

pub use claims::VerifiedClaims;
pub use error::{FetchError, TokenError};
pub use gate::{AuthGate, Unauthorized};
pub use jwks::{HttpJwksFetcher, Jwk, JwksFetcher, KeyCache, KeyCacheConfig, KeySet};
pub use jwt::TokenVerifier;
pub use resolver::KeyResolver;
