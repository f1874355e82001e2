//! HTTP error type for the auth gateway.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Gate
//! rejections use a `{"message": ...}` body; every other error uses
//! `{"error": ...}`. 5xx bodies are generic and the detail is logged.

use crate::auth::Unauthorized;
use crate::services::IdpError;
use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Login messages shown to users for the outcomes they can act on.
pub const USER_NOT_CONFIRMED_MESSAGE: &str =
    "User not confirmed. Please check your email for a verification link.";
pub const INCORRECT_CREDENTIALS_MESSAGE: &str =
    "Incorrect username or password. Please verify your credentials.";
pub const USER_NOT_FOUND_MESSAGE: &str =
    "User not found. Please register or check your email address.";
pub const PASSWORD_RESET_REQUIRED_MESSAGE: &str =
    "Password reset required. Please reset your password before logging in.";

/// Gateway error type.
///
/// Maps to HTTP status codes:
/// - Unauthorized, AuthenticationFailed: 401
/// - BadRequest: 400
/// - Forbidden: 403
/// - NotFound: 404
/// - RateLimitExceeded: 429
/// - ServiceUnavailable: 503
#[derive(Debug, Error)]
pub enum ApiError {
    /// Rejected by the auth gate.
    #[error("{0}")]
    Unauthorized(#[from] Unauthorized),

    /// Login failed for a reason without a dedicated mapping.
    #[error("{0}")]
    AuthenticationFailed(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) | ApiError::AuthenticationFailed(_) => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Translate a login failure into the user-facing outcome.
    pub fn from_login_error(err: IdpError) -> Self {
        match err {
            IdpError::UserNotConfirmed(_) => {
                ApiError::Forbidden(USER_NOT_CONFIRMED_MESSAGE.to_string())
            }
            IdpError::NotAuthorized(_) => {
                ApiError::BadRequest(INCORRECT_CREDENTIALS_MESSAGE.to_string())
            }
            IdpError::UserNotFound(_) => ApiError::NotFound(USER_NOT_FOUND_MESSAGE.to_string()),
            IdpError::PasswordResetRequired(_) => {
                ApiError::Forbidden(PASSWORD_RESET_REQUIRED_MESSAGE.to_string())
            }
            // Rejected before reaching the provider
            IdpError::InvalidParameter(message) => ApiError::BadRequest(message),
            err if err.is_throttling() => ApiError::RateLimitExceeded,
            IdpError::Unavailable(detail) => ApiError::ServiceUnavailable(detail),
            other => {
                let message = other.message();
                if message.is_empty() {
                    ApiError::AuthenticationFailed("Authentication failed".to_string())
                } else {
                    ApiError::AuthenticationFailed(message.to_string())
                }
            }
        }
    }
}

/// Account endpoints surface the provider's message as a 400.
impl From<IdpError> for ApiError {
    fn from(err: IdpError) -> Self {
        match err {
            err if err.is_throttling() => ApiError::RateLimitExceeded,
            IdpError::Unavailable(detail) => ApiError::ServiceUnavailable(detail),
            other => ApiError::BadRequest(other.message().to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            ApiError::Unauthorized(reason) => json!({ "message": reason.to_string() }),
            ApiError::AuthenticationFailed(message)
            | ApiError::BadRequest(message)
            | ApiError::Forbidden(message)
            | ApiError::NotFound(message) => json!({ "error": message }),
            ApiError::RateLimitExceeded => {
                json!({ "error": "Too many requests. Please try again later." })
            }
            ApiError::ServiceUnavailable(detail) => {
                // Log actual reason server-side
                tracing::warn!(target: "authgw.availability", reason = %detail, "Service unavailable");
                json!({ "error": "Service temporarily unavailable" })
            }
        };

        let mut response = (status, Json(body)).into_response();

        if let ApiError::Unauthorized(reason) = &self {
            let challenge = match reason {
                Unauthorized::MissingToken => "Bearer realm=\"auth-gateway\"",
                Unauthorized::InvalidToken => {
                    "Bearer realm=\"auth-gateway\", error=\"invalid_token\""
                }
            };
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }

        response
    }
}
