//! User account handlers.
//!
//! Each handler translates the HTTP shape to one [`UserService`] call and
//! the outcome back to HTTP. Account logic lives in the service.
//!
//! [`UserService`]: crate::services::UserService

use crate::auth::{Unauthorized, VerifiedClaims};
use crate::cookies::{read_cookie, AUTH_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::errors::ApiError;
use crate::middleware::AccessToken;
use crate::models::{
    ConfirmForgotPasswordRequest, ConfirmRequest, EmailRequest, EmptyResponse, LoginRequest,
    MeResponse, MessageResponse, RefreshRequest, SignUpRequest, SignUpResponse,
    UpdateUserRequest, UserEnvelope,
};
use crate::routes::AppState;
use crate::services::{IdpError, NewUser, ProfileUpdate};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Extension, Json,
};
use common::secret::SecretString;
use std::sync::Arc;
use tracing::instrument;

type Body<T> = Result<Json<UserEnvelope<T>>, JsonRejection>;

/// Body returned when the session cookie no longer maps to a user.
const SESSION_EXPIRED_MESSAGE: &str = "Session expired or invalid";

/// Unwrap a JSON body, turning extractor rejections into 400s.
fn user_body<T>(payload: Body<T>) -> Result<T, ApiError> {
    let Json(envelope) = payload?;
    Ok(envelope.user)
}

/// `GET /users/me`
///
/// Returns the profile of the user owning the access token.
#[instrument(skip_all, name = "authgw.handlers.get_me")]
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(AccessToken(token)): Extension<AccessToken>,
) -> Response {
    match state.user_service.get_user(&token).await {
        Ok(profile) => Json(MeResponse::new(profile)).into_response(),
        Err(e) if e.is_throttling() || matches!(e, IdpError::Unavailable(_)) => {
            ApiError::from(e).into_response()
        }
        Err(_) => {
            // Token verified but the provider rejected it (revoked, user deleted)
            let mut response =
                ApiError::AuthenticationFailed(SESSION_EXPIRED_MESSAGE.to_string()).into_response();
            state.cookies.clear_session(response.headers_mut());
            response
        }
    }
}

/// `POST /users`
#[instrument(skip_all, name = "authgw.handlers.sign_up")]
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    payload: Body<SignUpRequest>,
) -> Result<Json<UserEnvelope<SignUpResponse>>, ApiError> {
    let request = user_body(payload)?;
    let user = NewUser {
        email: request.email,
        password: SecretString::from(request.password),
        first_name: request.first_name,
        last_name: request.last_name,
    };

    let outcome = state.user_service.create_user(&user).await?;
    tracing::info!(
        target: "authgw.handlers.users",
        confirmed = outcome.confirmed,
        "User signed up"
    );

    Ok(Json(UserEnvelope::new(SignUpResponse {
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
    })))
}

/// `POST /users/confirm`
#[instrument(skip_all, name = "authgw.handlers.confirm")]
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    payload: Body<ConfirmRequest>,
) -> Result<Json<EmptyResponse>, ApiError> {
    let request = user_body(payload)?;

    state
        .user_service
        .confirm_user(&request.email, &request.confirmation_code)
        .await?;

    Ok(Json(EmptyResponse::default()))
}

/// `POST /users/login`
///
/// Sets the `authToken` and `refreshToken` cookies on success.
#[instrument(skip_all, name = "authgw.handlers.login")]
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Body<LoginRequest>,
) -> Result<(HeaderMap, Json<EmptyResponse>), ApiError> {
    let request = user_body(payload)?;
    let password = SecretString::from(request.password);

    let tokens = state
        .user_service
        .login(&request.email, &password)
        .await
        .map_err(ApiError::from_login_error)?;

    let mut headers = HeaderMap::new();
    if let Some(cookie) = state.cookies.set(AUTH_TOKEN_COOKIE, &tokens.access_token) {
        headers.append(header::SET_COOKIE, cookie);
    }
    if let Some(cookie) = tokens
        .refresh_token
        .as_ref()
        .and_then(|refresh| state.cookies.set(REFRESH_TOKEN_COOKIE, refresh))
    {
        headers.append(header::SET_COOKIE, cookie);
    }

    Ok((headers, Json(EmptyResponse::default())))
}

/// `POST /users/refresh`
///
/// Exchanges the refresh token (cookie, else body) for a new access token.
#[instrument(skip_all, name = "authgw.handlers.refresh")]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    request_headers: HeaderMap,
    payload: Body<RefreshRequest>,
) -> Result<(HeaderMap, Json<EmptyResponse>), ApiError> {
    let request = user_body(payload)?;

    let refresh_token = read_cookie(&request_headers, REFRESH_TOKEN_COOKIE)
        .or(request.refresh_token)
        .filter(|t| !t.is_empty())
        .map(SecretString::from)
        .ok_or(ApiError::Unauthorized(Unauthorized::MissingToken))?;

    let tokens = state
        .user_service
        .refresh_token(&request.email, &refresh_token)
        .await?;

    let mut headers = HeaderMap::new();
    if let Some(cookie) = state.cookies.set(AUTH_TOKEN_COOKIE, &tokens.access_token) {
        headers.append(header::SET_COOKIE, cookie);
    }
    // Only present when the pool rotates refresh tokens
    if let Some(cookie) = tokens
        .refresh_token
        .as_ref()
        .and_then(|refresh| state.cookies.set(REFRESH_TOKEN_COOKIE, refresh))
    {
        headers.append(header::SET_COOKIE, cookie);
    }

    Ok((headers, Json(EmptyResponse::default())))
}

/// `PUT /users`
///
/// Updates the caller's own profile; the target account comes from the
/// verified token, never the body.
#[instrument(skip_all, name = "authgw.handlers.update_user")]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<VerifiedClaims>,
    payload: Body<UpdateUserRequest>,
) -> Result<Json<EmptyResponse>, ApiError> {
    let request = user_body(payload)?;
    let update = ProfileUpdate {
        first_name: request.first_name,
        last_name: request.last_name,
    };

    state
        .user_service
        .update_attributes(claims.principal(), &update)
        .await?;

    Ok(Json(EmptyResponse::default()))
}

/// `DELETE /users`
///
/// Deletes the caller's own account and clears the auth cookies.
#[instrument(skip_all, name = "authgw.handlers.delete_user")]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<VerifiedClaims>,
) -> Result<(HeaderMap, Json<EmptyResponse>), ApiError> {
    state.user_service.delete_user(claims.principal()).await?;

    tracing::info!(target: "authgw.handlers.users", "User deleted");

    let mut headers = HeaderMap::new();
    state.cookies.clear_session(&mut headers);
    Ok((headers, Json(EmptyResponse::default())))
}

/// `POST /users/logout`
///
/// Tokens are provider-issued and stateless here; logging out only clears
/// the cookies.
#[instrument(skip_all, name = "authgw.handlers.logout")]
pub async fn logout(State(state): State<Arc<AppState>>) -> (HeaderMap, Json<MessageResponse>) {
    let mut headers = HeaderMap::new();
    state.cookies.clear_session(&mut headers);
    (
        headers,
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    )
}

/// `POST /users/forgot-password`
#[instrument(skip_all, name = "authgw.handlers.forgot_password")]
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    payload: Body<EmailRequest>,
) -> Result<Json<EmptyResponse>, ApiError> {
    let request = user_body(payload)?;

    state.user_service.forgot_password(&request.email).await?;

    Ok(Json(EmptyResponse::default()))
}

/// `POST /users/confirm-forgot-password`
#[instrument(skip_all, name = "authgw.handlers.confirm_forgot_password")]
pub async fn confirm_forgot_password(
    State(state): State<Arc<AppState>>,
    payload: Body<ConfirmForgotPasswordRequest>,
) -> Result<Json<EmptyResponse>, ApiError> {
    let request = user_body(payload)?;
    let password = SecretString::from(request.password);

    state
        .user_service
        .confirm_forgot_password(&request.email, &request.code, &password)
        .await?;

    Ok(Json(EmptyResponse::default()))
}

/// `POST /users/resend-confirmation-code`
#[instrument(skip_all, name = "authgw.handlers.resend_confirmation_code")]
pub async fn resend_confirmation_code(
    State(state): State<Arc<AppState>>,
    payload: Body<EmailRequest>,
) -> Result<Json<EmptyResponse>, ApiError> {
    let request = user_body(payload)?;

    state
        .user_service
        .resend_confirmation_code(&request.email)
        .await?;

    Ok(Json(EmptyResponse::default()))
}
