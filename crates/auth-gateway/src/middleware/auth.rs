//! Authentication middleware for protected routes.
//!
//! Takes the token from `Authorization: Bearer <token>` or, failing that,
//! the `authToken` cookie, runs it through the [`AuthGate`] and injects the
//! verified claims and raw access token into request extensions.

use crate::auth::AuthGate;
use crate::cookies::{read_cookie, CookiePolicy, AUTH_TOKEN_COOKIE};
use crate::errors::ApiError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use common::secret::SecretString;
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub gate: AuthGate,

    /// Used to expire auth cookies when a session is rejected.
    pub cookies: CookiePolicy,
}

/// The caller's raw access token, for handlers that call the provider on
/// the caller's behalf.
#[derive(Clone)]
pub struct AccessToken(pub SecretString);

/// Bearer token from the Authorization header, else the auth cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    match bearer {
        Some(token) => Some(token.to_string()),
        None => read_cookie(headers, AUTH_TOKEN_COOKIE),
    }
}

async fn authenticate(state: &AuthState, req: &mut Request) -> Result<(), ApiError> {
    let token = extract_token(req.headers());
    let claims = state.gate.authenticate(token.as_deref()).await?;

    tracing::debug!(target: "authgw.middleware.auth", principal = claims.principal(), "Request authenticated");

    req.extensions_mut().insert(claims);
    if let Some(token) = token {
        req.extensions_mut()
            .insert(AccessToken(SecretString::from(token)));
    }
    Ok(())
}

/// Authentication middleware that validates JWT tokens.
///
/// # Response
///
/// - Returns 401 with a WWW-Authenticate header if the token is missing or invalid
/// - Continues to next handler with claims in extensions if the token is valid
#[instrument(skip_all, name = "authgw.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authenticate(&state, &mut req).await?;
    Ok(next.run(req).await)
}

/// Like [`require_auth`], but a rejected request also has its auth cookies
/// expired so the browser drops the dead session.
#[instrument(skip_all, name = "authgw.middleware.session")]
pub async fn require_session(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Response {
    match authenticate(&state, &mut req).await {
        Ok(()) => next.run(req).await,
        Err(e) => {
            let mut response = e.into_response();
            state.cookies.clear_session(response.headers_mut());
            response
        }
    }
}
