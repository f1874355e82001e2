//! Token verification against the identity provider's signing keys.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Unverified content is only used to pick the signing key
//! - Only RS256 is accepted, regardless of what the token header claims
//! - Issuer, expiry, not-before and issued-at are checked after the signature
//! - Failure causes are logged at debug level only

use crate::auth::claims::VerifiedClaims;
use crate::auth::error::TokenError;
use crate::auth::jwks::Jwk;
use crate::auth::resolver::KeyResolver;
use crate::observability::metrics::record_token_verification;
use common::jwt::{decode_unverified, validate_iat};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::time::Duration;
use tracing::instrument;

/// Issuer URL of a Cognito user pool.
pub fn cognito_issuer(region: &str, user_pool_id: &str) -> String {
    format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}")
}

/// JWKS URL of a Cognito user pool.
pub fn cognito_jwks_url(region: &str, user_pool_id: &str) -> String {
    format!(
        "{}/.well-known/jwks.json",
        cognito_issuer(region, user_pool_id)
    )
}

/// Verifies bearer tokens issued by one user pool.
pub struct TokenVerifier {
    resolver: KeyResolver,
    issuer: String,
    clock_skew: Duration,
}

impl TokenVerifier {
    /// # Arguments
    ///
    /// * `resolver` - Key lookup over the shared cache
    /// * `issuer` - Exact `iss` value tokens must carry
    /// * `clock_skew` - Tolerance for `iat` in the future
    pub fn new(resolver: KeyResolver, issuer: String, clock_skew: Duration) -> Self {
        Self {
            resolver,
            issuer,
            clock_skew,
        }
    }

    /// Verify a token and return its claims.
    ///
    /// # Checks
    ///
    /// 1. Structure - size, three segments, decodable header with `kid`
    /// 2. Key resolution by `kid` (one forced refresh on a miss)
    /// 3. RS256 signature with the resolved key
    /// 4. `iss`, `exp` (required), `nbf` (when present)
    /// 5. `iat` (when present) within clock skew
    ///
    /// # Errors
    ///
    /// - `TokenError::Malformed` for structural failures
    /// - `TokenError::UnknownKey` / `TokenError::Fetch` from key resolution
    /// - `TokenError::Invalid` for every check after key resolution
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<VerifiedClaims, TokenError> {
        let result = self.verify_inner(token).await;

        match &result {
            Ok(_) => {
                tracing::debug!(target: "authgw.auth.jwt", "Token validated successfully");
                record_token_verification("success");
            }
            Err(e) => record_token_verification(e.as_label()),
        }

        result
    }

    async fn verify_inner(&self, token: &str) -> Result<VerifiedClaims, TokenError> {
        let header = decode_unverified(token).map_err(|e| {
            tracing::debug!(target: "authgw.auth.jwt", error = ?e, "Token structure rejected");
            TokenError::Malformed
        })?;

        let jwk = self.resolver.resolve(&header.kid).await?;

        let claims = verify_signature(token, &jwk, &self.issuer)?;

        if let Some(iat) = claims.iat {
            validate_iat(iat, self.clock_skew).map_err(|e| {
                tracing::debug!(target: "authgw.auth.jwt", error = ?e, "Token iat validation failed");
                TokenError::Invalid
            })?;
        }

        Ok(claims)
    }
}

/// Verify the signature and registered claims with a resolved key.
fn verify_signature(token: &str, jwk: &Jwk, issuer: &str) -> Result<VerifiedClaims, TokenError> {
    if jwk.kty != "RSA" {
        tracing::warn!(target: "authgw.auth.jwt", kty = %jwk.kty, "Unexpected JWK key type");
        return Err(TokenError::Invalid);
    }
    if let Some(alg) = &jwk.alg {
        if alg != "RS256" {
            tracing::warn!(target: "authgw.auth.jwt", alg = %alg, "Unexpected JWK algorithm");
            return Err(TokenError::Invalid);
        }
    }

    let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
        tracing::error!(target: "authgw.auth.jwt", kid = %jwk.kid, "JWK missing RSA components");
        return Err(TokenError::Invalid);
    };

    let decoding_key = DecodingKey::from_rsa_components(n, e).map_err(|e| {
        tracing::error!(target: "authgw.auth.jwt", error = %e, "Invalid RSA key encoding");
        TokenError::Invalid
    })?;

    // The algorithm list is fixed; a token whose header names any other
    // algorithm fails here rather than selecting a different verifier.
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&["exp", "iss"]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    // Access tokens have no aud; ID tokens use the client ID
    validation.validate_aud = false;

    let token_data = decode::<VerifiedClaims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!(target: "authgw.auth.jwt", error = %e, "Token verification failed");
        TokenError::Invalid
    })?;

    Ok(token_data.claims)
}
