//! HTTP routes for the auth gateway.
//!
//! Defines the Axum router and application state.

use crate::auth::KeyCache;
use crate::config::Config;
use crate::cookies::CookiePolicy;
use crate::handlers::{self, users};
use crate::middleware::{http_metrics_middleware, require_auth, require_session, AuthState};
use crate::services::UserService;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Request timeout applied to every route.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,

    pub user_service: UserService,

    /// Auth gate plus cookie policy, shared with the auth middleware.
    pub auth: Arc<AuthState>,

    /// Process-wide signing key cache, also used by the readiness probe.
    pub key_cache: Arc<KeyCache>,

    pub cookies: CookiePolicy,
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(target: "authgw.routes", origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK") - public, unversioned
/// - `/ready` - Readiness probe (JWKS key set obtainable) - public, unversioned
/// - `/metrics` - Prometheus metrics endpoint - public, unversioned
/// - `{prefix}/users/*` - account endpoints; `GET /me` requires a session,
///   `PUT /` and `DELETE /` require a valid token
///
/// Global layers: request id, tracing, CORS, security headers, 30 second
/// timeout and HTTP metrics (outermost).
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::clone(&state.auth);

    let public_user_routes = Router::new()
        .route("/", post(users::sign_up))
        .route("/confirm", post(users::confirm))
        .route("/login", post(users::login))
        .route("/refresh", post(users::refresh))
        .route("/logout", post(users::logout))
        .route("/forgot-password", post(users::forgot_password))
        .route(
            "/confirm-forgot-password",
            post(users::confirm_forgot_password),
        )
        .route(
            "/resend-confirmation-code",
            post(users::resend_confirmation_code),
        );

    // Token required; the target account is always the caller's own
    let protected_user_routes = Router::new()
        .route("/", axum::routing::put(users::update_user).delete(users::delete_user))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&auth_state),
            require_auth,
        ));

    // Token required; a rejected session also has its cookies expired
    let session_user_routes = Router::new()
        .route("/me", get(users::get_me))
        .route_layer(middleware::from_fn_with_state(auth_state, require_session));

    let user_routes = public_user_routes
        .merge(protected_user_routes)
        .merge(session_user_routes);

    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .nest(&format!("{}/users", state.config.api_prefix), user_routes)
        .with_state(Arc::clone(&state));

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. CORS
    // 3. TraceLayer
    // 4. Request id set/propagate
    // 5. Security headers
    // 6. http_metrics_middleware (outermost)
    api_routes
        .merge(metrics_routes)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors_layer(&state.config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=15552000; includeSubDomains"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-dns-prefetch-control"),
            HeaderValue::from_static("off"),
        ))
        // Outermost so framework-level rejections are counted
        .layer(middleware::from_fn(http_metrics_middleware))
}
