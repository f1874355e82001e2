//! Auth cookies.
//!
//! Login stores the access and refresh tokens in `HttpOnly` cookies so a
//! browser client never handles them directly.

use axum::http::{header, HeaderMap, HeaderValue};
use common::secret::{ExposeSecret, SecretString};

/// Cookie carrying the access token.
pub const AUTH_TOKEN_COOKIE: &str = "authToken";

/// Cookie carrying the refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Lifetime of both auth cookies (one week).
pub const COOKIE_MAX_AGE_SECONDS: u64 = 7 * 24 * 3600;

/// Builds `Set-Cookie` values with the gateway's cookie attributes.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    secure: bool,
}

impl CookiePolicy {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    fn build(&self, name: &str, value: &str, max_age: u64) -> Option<HeaderValue> {
        let mut cookie = format!(
            "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
            name, value, max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        // Token values are base64url segments; anything else is dropped
        match HeaderValue::from_str(&cookie) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(target: "authgw.cookies", cookie = name, "Cookie value not representable in a header");
                None
            }
        }
    }

    /// `Set-Cookie` value storing `token` under `name`.
    pub fn set(&self, name: &str, token: &SecretString) -> Option<HeaderValue> {
        self.build(name, token.expose_secret(), COOKIE_MAX_AGE_SECONDS)
    }

    /// `Set-Cookie` value expiring `name` immediately.
    pub fn clear(&self, name: &str) -> Option<HeaderValue> {
        self.build(name, "", 0)
    }

    /// Append `Set-Cookie` headers clearing both auth cookies.
    pub fn clear_session(&self, headers: &mut HeaderMap) {
        for name in [AUTH_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
            if let Some(value) = self.clear(name) {
                headers.append(header::SET_COOKIE, value);
            }
        }
    }
}

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
