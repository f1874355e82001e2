//! The single point where token failures become "unauthorized".

use crate::auth::claims::VerifiedClaims;
use crate::auth::jwt::TokenVerifier;
use crate::observability::metrics::record_token_verification;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Why a request is not authenticated.
///
/// The messages are the exact strings returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Unauthorized {
    #[error("No token provided")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,
}

/// Turns an optional bearer token into verified claims or [`Unauthorized`].
#[derive(Clone)]
pub struct AuthGate {
    verifier: Arc<TokenVerifier>,
}

impl AuthGate {
    pub fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self { verifier }
    }

    /// Authenticate a request's token.
    ///
    /// A missing or empty token is rejected without touching the verifier.
    ///
    /// # Errors
    ///
    /// - `Unauthorized::MissingToken` when there is no token
    /// - `Unauthorized::InvalidToken` for any verification failure
    #[instrument(skip_all)]
    pub async fn authenticate(&self, token: Option<&str>) -> Result<VerifiedClaims, Unauthorized> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            tracing::debug!(target: "authgw.auth.gate", "No token provided");
            record_token_verification("missing");
            return Err(Unauthorized::MissingToken);
        };

        self.verifier.verify(token).await.map_err(|e| {
            tracing::debug!(target: "authgw.auth.gate", error = %e, kind = e.as_label(), "Token rejected");
            Unauthorized::InvalidToken
        })
    }
}
