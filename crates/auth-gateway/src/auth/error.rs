//! Error kinds below the auth gate.
//!
//! Each failure stays distinct here so logs and metrics can tell them apart.
//! The gate collapses all of them into a single unauthorized outcome.

use thiserror::Error;

/// Failure to obtain a key set from the JWKS endpoint.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Transport-level failure (connect, TLS, reset).
    #[error("JWKS request failed: {0}")]
    Request(String),

    /// The fetch did not complete within the configured timeout.
    #[error("JWKS request timed out")]
    Timeout,

    /// The endpoint answered with a non-success status.
    #[error("JWKS endpoint returned status {0}")]
    Status(u16),

    /// The body was not a valid key set document.
    #[error("JWKS response could not be parsed: {0}")]
    Parse(String),
}

/// Reasons a token fails verification.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Not a structurally valid JWT (size, segments, encoding, header).
    #[error("token is malformed")]
    Malformed,

    /// No key with the token's `kid` exists, even after a refresh.
    #[error("no signing key matches the token")]
    UnknownKey,

    /// Signature, algorithm, issuer or time checks failed.
    #[error("token failed verification")]
    Invalid,

    /// The key set could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl TokenError {
    /// Short label for metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::UnknownKey => "unknown_key",
            TokenError::Invalid => "invalid",
            TokenError::Fetch(_) => "fetch_error",
        }
    }
}
