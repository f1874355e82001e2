//! Wiremock-backed JWKS endpoint.

use crate::tokens::{jwks_json, TestKeypair};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock serves the key set on.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// A JWKS endpoint whose keys and failures tests control.
///
/// Call-count expectations are verified when the server is dropped.
pub struct JwksMockServer {
    server: MockServer,
}

impl JwksMockServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Serve `keypairs`, replacing whatever was mounted before.
    pub async fn mount_keys(&self, keypairs: &[TestKeypair]) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(keypairs)))
            .mount(&self.server)
            .await;
    }

    /// Serve `keypairs` and expect exactly `calls` fetches.
    pub async fn expect_jwks_calls(&self, keypairs: &[TestKeypair], calls: u64) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(keypairs)))
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Answer every fetch with `status`.
    pub async fn mount_failure(&self, status: u16) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Number of JWKS requests received so far.
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or_default()
    }
}
