//! Auth Gateway
//!
//! Entry point for the HTTP façade over a Cognito user pool.

use auth_gateway::auth::clock::SystemClock;
use auth_gateway::auth::{AuthGate, HttpJwksFetcher, KeyCache, KeyResolver, TokenVerifier};
use auth_gateway::config::{Config, LogFormat};
use auth_gateway::cookies::CookiePolicy;
use auth_gateway::middleware::AuthState;
use auth_gateway::observability::metrics::init_metrics_recorder;
use auth_gateway::routes::{self, AppState};
use auth_gateway::services::{CognitoIdentityProvider, UserService};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "auth_gateway=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first so the log format is known
    let config = Config::from_env();
    init_tracing(
        config
            .as_ref()
            .map(|c| c.log_format)
            .unwrap_or(LogFormat::Text),
    );

    info!("Starting Auth Gateway");

    let config = config.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        region = %config.cognito_region,
        user_pool_id = %config.cognito_user_pool_id,
        jwks_url = %config.jwks_url,
        api_prefix = %config.api_prefix,
        jwks_cache_ttl_seconds = config.jwks_cache_ttl.as_secs(),
        jwt_clock_skew_seconds = config.jwt_clock_skew.as_secs(),
        client_secret_configured = config.cognito_client_secret.is_some(),
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    // Token verification pipeline, built once and shared
    let fetcher = Arc::new(HttpJwksFetcher::new(
        config.jwks_url.clone(),
        config.jwks_fetch_timeout,
    ));
    let key_cache = Arc::new(KeyCache::new(
        fetcher,
        Arc::new(SystemClock),
        config.key_cache_config(),
    ));
    let verifier = Arc::new(TokenVerifier::new(
        KeyResolver::new(Arc::clone(&key_cache)),
        config.issuer(),
        config.jwt_clock_skew,
    ));
    let gate = AuthGate::new(verifier);

    // Warm the key cache; a failure here is retried on first use
    match key_cache.get_key_set().await {
        Ok(keys) => info!(keys = keys.len(), "Signing keys loaded"),
        Err(e) => warn!(error = %e, "Initial JWKS fetch failed, continuing"),
    }

    let provider = Arc::new(CognitoIdentityProvider::from_config(&config).await);
    let user_service = UserService::new(provider);

    let cookies = CookiePolicy::new(config.cookie_secure);
    let bind_address = config.bind_address.clone();
    let drain_period = config.drain_period;

    let state = Arc::new(AppState {
        config,
        user_service,
        auth: Arc::new(AuthState { gate, cookies }),
        key_cache,
        cookies,
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Auth Gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(drain_period))
        .await?;

    info!("Auth Gateway shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and the drain period is complete.
async fn shutdown_signal(drain_period: Duration) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain_period.is_zero() {
        info!("Skipping drain period (DRAIN_SECONDS=0)");
    } else {
        warn!("Draining connections for {} seconds...", drain_period.as_secs());
        tokio::time::sleep(drain_period).await;
        info!("Drain period complete");
    }
}
