//! Test server harness for E2E testing
//!
//! Provides `TestGatewayServer` for spawning the real gateway router in tests,
//! backed by a mock identity provider and a wiremock JWKS endpoint.

use crate::jwks_server::JwksMockServer;
use crate::tokens::{TEST_CLIENT_ID, TEST_REGION, TEST_USER_POOL_ID};
use auth_gateway::auth::clock::SystemClock;
use auth_gateway::auth::{AuthGate, HttpJwksFetcher, KeyCache, KeyResolver, TokenVerifier};
use auth_gateway::config::Config;
use auth_gateway::cookies::CookiePolicy;
use auth_gateway::middleware::AuthState;
use auth_gateway::routes::{self, AppState};
use auth_gateway::services::identity_provider::mock::MockIdentityProvider;
use auth_gateway::services::UserService;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the auth gateway in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> anyhow::Result<()> {
///     let jwks = JwksMockServer::start().await;
///     let server = TestGatewayServer::spawn(&jwks).await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGatewayServer {
    addr: SocketAddr,
    config: Config,
    provider: Arc<MockIdentityProvider>,
    key_cache: Arc<KeyCache>,
    _handle: JoinHandle<()>,
}

impl TestGatewayServer {
    /// Spawn a server verifying tokens against `jwks`.
    pub async fn spawn(jwks: &JwksMockServer) -> Result<Self, anyhow::Error> {
        Self::spawn_with(jwks, HashMap::new()).await
    }

    /// Spawn a server with extra environment-style overrides.
    ///
    /// Defaults target the test user pool; JWKS settings keep their
    /// production defaults unless overridden.
    pub async fn spawn_with(
        jwks: &JwksMockServer,
        overrides: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("COGNITO_REGION".to_string(), TEST_REGION.to_string()),
            (
                "COGNITO_USER_POOL_ID".to_string(),
                TEST_USER_POOL_ID.to_string(),
            ),
            ("COGNITO_CLIENT_ID".to_string(), TEST_CLIENT_ID.to_string()),
            ("JWKS_URL".to_string(), jwks.jwks_url()),
        ]);
        vars.extend(overrides);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

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

        let provider = Arc::new(MockIdentityProvider::succeeding());
        let cookies = CookiePolicy::new(config.cookie_secure);
        let state = Arc::new(AppState {
            config: config.clone(),
            user_service: UserService::new(provider.clone()),
            auth: Arc::new(AuthState {
                gate: AuthGate::new(verifier),
                cookies,
            }),
            key_cache: Arc::clone(&key_cache),
            cookies,
        });

        // The global recorder can only be installed once per process
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(state, metrics_handle);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            provider,
            key_cache,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL of a user API route, e.g. `users_url("/login")`.
    pub fn users_url(&self, route: &str) -> String {
        format!("{}{}/users{}", self.url(), self.config.api_prefix, route)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The mock identity provider behind the server.
    pub fn provider(&self) -> &Arc<MockIdentityProvider> {
        &self.provider
    }

    pub fn key_cache(&self) -> &Arc<KeyCache> {
        &self.key_cache
    }
}

impl Drop for TestGatewayServer {
    fn drop(&mut self) {
        // Stop the server task as soon as the test is done with it
        self._handle.abort();
    }
}
