//! Claims builder and token signing for tests.
//!
//! Tokens look like Cognito access tokens for the test user pool.

use crate::keys;
use auth_gateway::auth::jwt::cognito_issuer;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Region of the test user pool.
pub const TEST_REGION: &str = "us-east-1";

/// Id of the test user pool.
pub const TEST_USER_POOL_ID: &str = "us-east-1_TestPool";

/// App client id of the test user pool.
pub const TEST_CLIENT_ID: &str = "test-client-id";

/// Issuer of tokens from the test user pool.
pub fn test_issuer() -> String {
    cognito_issuer(TEST_REGION, TEST_USER_POOL_ID)
}

/// Current Unix time in seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Builder for access token claims.
///
/// # Example
/// ```rust,ignore
/// let claims = TestClaims::new()
///     .with_sub("u42")
///     .with_scope("aws.cognito.signin.user.admin")
///     .expires_in(60);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct TestClaims {
    pub sub: String,
    pub iss: String,
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    pub token_use: String,
    pub client_id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(rename = "cognito:groups", skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

impl TestClaims {
    /// Valid for one hour, issued now, for user `u1` / `alice@example.com`.
    pub fn new() -> Self {
        let now = unix_now();
        Self {
            sub: "u1".to_string(),
            iss: test_issuer(),
            exp: now + 3600,
            iat: Some(now),
            nbf: None,
            token_use: "access".to_string(),
            client_id: TEST_CLIENT_ID.to_string(),
            username: "alice@example.com".to_string(),
            scope: None,
            groups: Vec::new(),
        }
    }

    pub fn with_sub(mut self, sub: &str) -> Self {
        self.sub = sub.to_string();
        self
    }

    pub fn with_username(mut self, username: &str) -> Self {
        self.username = username.to_string();
        self
    }

    pub fn with_issuer(mut self, iss: &str) -> Self {
        self.iss = iss.to_string();
        self
    }

    /// Set the scope (space-separated)
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    pub fn with_groups(mut self, groups: &[&str]) -> Self {
        self.groups = groups.iter().map(|g| g.to_string()).collect();
        self
    }

    /// Set expiration in seconds from now
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = unix_now() + seconds;
        self
    }

    /// Expired an hour ago, well past any leeway.
    pub fn expired(mut self) -> Self {
        let now = unix_now();
        self.exp = now - 3600;
        self.iat = Some(now - 7200);
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = Some(timestamp);
        self
    }

    pub fn without_iat(mut self) -> Self {
        self.iat = None;
        self
    }

    pub fn not_before(mut self, timestamp: i64) -> Self {
        self.nbf = Some(timestamp);
        self
    }
}

impl Default for TestClaims {
    fn default() -> Self {
        Self::new()
    }
}

/// One of the fixed RSA test keypairs.
#[derive(Debug, Clone, Copy)]
pub struct TestKeypair {
    kid: &'static str,
    modulus: &'static str,
    private_key_pem: &'static str,
}

impl TestKeypair {
    pub fn primary() -> Self {
        Self {
            kid: keys::PRIMARY_KID,
            modulus: keys::PRIMARY_MODULUS,
            private_key_pem: keys::PRIMARY_PRIVATE_KEY_PEM,
        }
    }

    pub fn rotated() -> Self {
        Self {
            kid: keys::ROTATED_KID,
            modulus: keys::ROTATED_MODULUS,
            private_key_pem: keys::ROTATED_PRIVATE_KEY_PEM,
        }
    }

    pub fn kid(&self) -> &'static str {
        self.kid
    }

    pub fn modulus(&self) -> &'static str {
        self.modulus
    }

    /// RS256 token with this key's own `kid`.
    pub fn sign(&self, claims: &TestClaims) -> String {
        self.sign_with_kid(claims, self.kid)
    }

    /// RS256 token signed by this key but naming `kid` in the header.
    pub fn sign_with_kid(&self, claims: &TestClaims, kid: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        let key = EncodingKey::from_rsa_pem(self.private_key_pem.as_bytes())
            .expect("test key PEM should parse");
        encode(&header, claims, &key).expect("signing test token should succeed")
    }

    /// Public JWK as published in a JWKS document.
    pub fn jwk_json(&self) -> Value {
        json!({
            "kid": self.kid,
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "n": self.modulus,
            "e": keys::EXPONENT,
        })
    }
}

/// JWKS document publishing `keypairs`.
pub fn jwks_json(keypairs: &[TestKeypair]) -> Value {
    json!({ "keys": keypairs.iter().map(TestKeypair::jwk_json).collect::<Vec<_>>() })
}

/// HS256 token keyed with `secret`, for algorithm-confusion tests.
pub fn sign_hs256(claims: &TestClaims, kid: &str, secret: &[u8]) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_secret(secret))
        .expect("signing test token should succeed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};

    #[test]
    fn test_claims_defaults() {
        let claims = serde_json::to_value(TestClaims::new()).unwrap();

        assert_eq!(claims["sub"], "u1");
        assert_eq!(claims["iss"], test_issuer());
        assert_eq!(claims["token_use"], "access");
        assert!(claims.get("nbf").is_none());
        assert!(claims.get("cognito:groups").is_none());
    }

    #[test]
    fn test_sign_uses_kid_and_verifies_with_modulus() {
        let keypair = TestKeypair::primary();
        let token = keypair.sign(&TestClaims::new());

        let header = decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some(keys::PRIMARY_KID));

        let key = DecodingKey::from_rsa_components(keypair.modulus(), keys::EXPONENT).unwrap();
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[test_issuer()]);
        let data = decode::<Value>(&token, &key, &validation).unwrap();
        assert_eq!(data.claims["username"], "alice@example.com");
    }

    #[test]
    fn test_keys_differ() {
        let token = TestKeypair::rotated().sign(&TestClaims::new());
        let primary =
            DecodingKey::from_rsa_components(keys::PRIMARY_MODULUS, keys::EXPONENT).unwrap();

        assert!(decode::<Value>(&token, &primary, &Validation::new(Algorithm::RS256)).is_err());
    }

    #[test]
    fn test_jwks_json_lists_keys() {
        let doc = jwks_json(&[TestKeypair::primary(), TestKeypair::rotated()]);

        assert_eq!(doc["keys"][0]["kid"], keys::PRIMARY_KID);
        assert_eq!(doc["keys"][1]["kid"], keys::ROTATED_KID);
    }
}
