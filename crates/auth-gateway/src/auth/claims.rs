//! Claims of a verified provider token.
//!
//! Access tokens carry `username` and `client_id`; ID tokens carry
//! `cognito:username` and custom attributes. Both shapes deserialize into
//! [`VerifiedClaims`]. The `sub` field is redacted in Debug output.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Claims extracted from a token whose signature, issuer and times checked out.
#[derive(Clone, Serialize, Deserialize)]
pub struct VerifiedClaims {
    /// Subject (the provider's user ID) - redacted in Debug output.
    pub sub: String,

    /// Issuer URL.
    pub iss: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// "access" or "id".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,

    /// App client the token was issued to (access tokens).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Provider username (`username` on access tokens, `cognito:username` on ID tokens).
    #[serde(
        default,
        alias = "cognito:username",
        skip_serializing_if = "Option::is_none"
    )]
    pub username: Option<String>,

    /// Space-separated OAuth scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Group memberships.
    #[serde(default, rename = "cognito:groups", skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,

    /// Every other claim, including custom attributes.
    #[serde(flatten)]
    pub custom: HashMap<String, Value>,
}

impl fmt::Debug for VerifiedClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedClaims")
            .field("sub", &"[REDACTED]")
            .field("iss", &self.iss)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .field("token_use", &self.token_use)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("scope", &self.scope)
            .field("groups", &self.groups)
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl VerifiedClaims {
    /// Name to pass to admin operations on the caller's own account.
    ///
    /// Falls back to `sub`, which the provider also accepts as a username.
    pub fn principal(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.sub)
    }

    /// Look up a claim that has no dedicated field.
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.custom.get(name)
    }
}
