//! Auth gateway API models.
//!
//! User API bodies are wrapped in a `{"user": {...}}` envelope with camelCase
//! fields. Request types carrying secrets redact them in Debug output.

use crate::services::UserProfile;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `{"user": ...}` envelope used by every user API request and response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEnvelope<T> {
    pub user: T,
}

impl<T> UserEnvelope<T> {
    pub fn new(user: T) -> Self {
        Self { user }
    }
}

/// Body of `POST /users` (sign up).
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl fmt::Debug for SignUpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUpRequest")
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Sign-up response: the submitted profile, without the password.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResponse {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Body of `POST /users/confirm`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub email: String,
    pub confirmation_code: String,
}

/// Body of `POST /users/login`.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Body of `POST /users/refresh`.
///
/// The refresh token normally arrives in its cookie; a body value is
/// accepted for non-browser clients.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub email: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl fmt::Debug for RefreshRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshRequest")
            .field("email", &self.email)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Body of `PUT /users`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub first_name: String,
    pub last_name: String,
}

/// Body of endpoints that only need the account's email.
#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// Body of `POST /users/confirm-forgot-password`.
#[derive(Deserialize)]
pub struct ConfirmForgotPasswordRequest {
    pub email: String,
    pub code: String,
    pub password: String,
}

impl fmt::Debug for ConfirmForgotPasswordRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmForgotPasswordRequest")
            .field("email", &self.email)
            .field("code", &"[REDACTED]")
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// `GET /users/me` response body.
pub type MeResponse = UserEnvelope<UserProfile>;

/// Plain `{"message": ...}` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Empty `{}` body returned by account operations with nothing to report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyResponse {}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    /// JWKS key set status ("available" or "unavailable").
    pub jwks: &'static str,

    /// Number of signing keys held, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<usize>,

    /// Generic error message; details are only logged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
