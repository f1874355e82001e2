//! JWKS fetching and the shared signing-key cache.
//!
//! The cache holds one immutable [`KeySet`] behind an `Arc` and replaces it
//! wholesale on refresh, so readers always see either the old set or the new
//! one. Refreshes are single-flight: callers serialise on an async lock and,
//! once they hold it, reuse the outcome of any attempt that finished while
//! they waited, success or failure.
//!
//! # Security
//!
//! - Keys are only ever taken from the configured JWKS endpoint
//! - A stale set is served only within a bounded window after a failed refresh

use crate::auth::clock::Clock;
use crate::auth::error::FetchError;
use crate::observability::metrics::{record_jwks_fetch, record_jwks_stale_served};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default key set TTL (24 hours).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default bound on serving a stale set after failed refreshes (48 hours).
pub const DEFAULT_MAX_STALE: Duration = Duration::from_secs(48 * 60 * 60);

/// Default spacing between degraded-mode fetch attempts, and how long an
/// unresolvable `kid` is remembered.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Default JWKS fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON Web Key from the JWKS endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Jwk {
    /// Key ID - used to select the correct key for verification.
    pub kid: String,

    /// Key type (must be "RSA" to be usable).
    pub kty: String,

    /// Algorithm (must be "RS256" when present).
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig").
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

/// One fetched generation of signing keys.
#[derive(Debug)]
pub struct KeySet {
    keys: Vec<Jwk>,
    fetched_at: Instant,
}

impl KeySet {
    pub fn new(keys: Vec<Jwk>, fetched_at: Instant) -> Self {
        Self { keys, fetched_at }
    }

    /// Look up a key by ID.
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|key| key.kid == kid)
    }

    pub fn keys(&self) -> &[Jwk] {
        &self.keys
    }

    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Source of key sets.
#[async_trait]
pub trait JwksFetcher: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Jwk>, FetchError>;
}

/// Fetches the JWKS document over HTTPS.
pub struct HttpJwksFetcher {
    jwks_url: String,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl HttpJwksFetcher {
    /// Create a fetcher for `jwks_url` with a per-request `timeout`.
    pub fn new(jwks_url: String, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "authgw.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            timeout,
        }
    }

}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    async fn fetch(&self) -> Result<Vec<Jwk>, FetchError> {
        tracing::debug!(target: "authgw.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Parse(e.to_string())
            }
        })?;

        Ok(jwks.keys)
    }
}

/// Timing policy for the key cache.
#[derive(Debug, Clone, Copy)]
pub struct KeyCacheConfig {
    /// Age after which a held set must be refreshed before use.
    pub ttl: Duration,

    /// Oldest set that may still be served while refreshes are failing.
    pub max_stale: Duration,

    /// Spacing between fetch attempts while serving a stale set, and how
    /// long the resolver remembers a `kid` that a refresh did not produce.
    pub min_refresh_interval: Duration,
}

impl Default for KeyCacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            max_stale: DEFAULT_MAX_STALE,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }
}

/// Bookkeeping guarded by the refresh lock.
#[derive(Default)]
struct RefreshState {
    last_attempt: Option<Instant>,

    /// Error of the most recent attempt, `None` if it succeeded.
    last_error: Option<FetchError>,
}

/// Process-wide cache of the provider's signing keys.
pub struct KeyCache {
    fetcher: Arc<dyn JwksFetcher>,
    clock: Arc<dyn Clock>,
    config: KeyCacheConfig,
    current: RwLock<Option<Arc<KeySet>>>,
    refresh: Mutex<RefreshState>,

    /// Completed fetch attempts. Bumped under the refresh lock.
    attempts: AtomicU64,
}

impl KeyCache {
    pub fn new(
        fetcher: Arc<dyn JwksFetcher>,
        clock: Arc<dyn Clock>,
        config: KeyCacheConfig,
    ) -> Self {
        Self {
            fetcher,
            clock,
            config,
            current: RwLock::new(None),
            refresh: Mutex::new(RefreshState::default()),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &KeyCacheConfig {
        &self.config
    }

    /// Return a key set no older than the TTL, fetching if needed.
    ///
    /// If the refresh fails but the held set is within `max_stale`, the held
    /// set is returned and a warning logged.
    ///
    /// # Errors
    ///
    /// Returns the fetch error when no usable set can be produced.
    #[instrument(skip_all)]
    pub async fn get_key_set(&self) -> Result<Arc<KeySet>, FetchError> {
        if let Some(set) = self.held().await {
            if self.is_fresh(&set) {
                return Ok(set);
            }
        }

        let observed = self.attempts.load(Ordering::Acquire);
        let mut state = self.refresh.lock().await;

        // Another caller may have refreshed while we waited.
        let held = self.held().await;
        if let Some(set) = &held {
            if self.is_fresh(set) {
                return Ok(Arc::clone(set));
            }
        }

        if self.attempts.load(Ordering::Acquire) != observed {
            // An attempt finished while we waited and did not yield a fresh set.
            if let Some(set) = held.as_ref().filter(|set| self.within_stale_window(set)) {
                record_jwks_stale_served();
                return Ok(Arc::clone(set));
            }
            if let Some(e) = &state.last_error {
                tracing::debug!(target: "authgw.auth.jwks", error = %e, "Sharing outcome of concurrent JWKS fetch");
                return Err(e.clone());
            }
        }

        if let Some(set) = &held {
            if self.within_stale_window(set) && self.recently_attempted(&state) {
                tracing::debug!(target: "authgw.auth.jwks", "Refresh attempted recently, serving stale JWKS");
                record_jwks_stale_served();
                return Ok(Arc::clone(set));
            }
        }

        match self.fetch_and_store(&mut state).await {
            Ok(set) => Ok(set),
            Err(e) => match held {
                Some(set) if self.within_stale_window(&set) => {
                    tracing::warn!(
                        target: "authgw.auth.jwks",
                        error = %e,
                        age_secs = self.age(&set).as_secs(),
                        "JWKS refresh failed, serving stale key set"
                    );
                    record_jwks_stale_served();
                    Ok(set)
                }
                _ => Err(e),
            },
        }
    }

    /// Refresh regardless of TTL, coalescing with concurrent refreshes.
    ///
    /// `seen` is the set the caller already looked in. If the held set has
    /// changed since then it is returned without fetching; if an attempt
    /// failed while the caller waited for the lock, that error is returned.
    /// Otherwise exactly one fetch is made, however recent the last one was.
    ///
    /// # Errors
    ///
    /// Returns the fetch error of this caller's attempt or of the concurrent
    /// attempt it joined.
    #[instrument(skip_all)]
    pub async fn force_refresh(
        &self,
        seen: Option<&Arc<KeySet>>,
    ) -> Result<Arc<KeySet>, FetchError> {
        let observed = self.attempts.load(Ordering::Acquire);
        let mut state = self.refresh.lock().await;

        if let Some(set) = self.held().await {
            let changed = seen.map_or(true, |seen| !Arc::ptr_eq(seen, &set));
            if changed {
                tracing::debug!(target: "authgw.auth.jwks", "JWKS already refreshed by another caller");
                return Ok(set);
            }
        }

        if self.attempts.load(Ordering::Acquire) != observed {
            if let Some(e) = &state.last_error {
                return Err(e.clone());
            }
        }

        self.fetch_and_store(&mut state).await
    }

    async fn held(&self) -> Option<Arc<KeySet>> {
        self.current.read().await.clone()
    }

    fn age(&self, set: &KeySet) -> Duration {
        self.clock.now().saturating_duration_since(set.fetched_at)
    }

    fn is_fresh(&self, set: &KeySet) -> bool {
        self.age(set) <= self.config.ttl
    }

    fn within_stale_window(&self, set: &KeySet) -> bool {
        self.age(set) <= self.config.max_stale
    }

    fn recently_attempted(&self, state: &RefreshState) -> bool {
        state.last_attempt.is_some_and(|last| {
            self.clock.now().saturating_duration_since(last) < self.config.min_refresh_interval
        })
    }

    pub(crate) fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Fetch and swap in a new set. Caller must hold the refresh lock.
    async fn fetch_and_store(&self, state: &mut RefreshState) -> Result<Arc<KeySet>, FetchError> {
        state.last_attempt = Some(self.clock.now());
        let start = Instant::now();

        let result = self.fetch_once(start).await;
        state.last_error = result.as_ref().err().cloned();
        self.attempts.fetch_add(1, Ordering::AcqRel);
        result
    }

    async fn fetch_once(&self, start: Instant) -> Result<Arc<KeySet>, FetchError> {
        match self.fetcher.fetch().await {
            Ok(keys) => {
                record_jwks_fetch("success", start.elapsed());
                let set = Arc::new(KeySet::new(keys, self.clock.now()));
                *self.current.write().await = Some(Arc::clone(&set));

                tracing::info!(
                    target: "authgw.auth.jwks",
                    key_count = set.len(),
                    "JWKS cache refreshed"
                );
                Ok(set)
            }
            Err(e) => {
                let status = if matches!(e, FetchError::Timeout) {
                    "timeout"
                } else {
                    "error"
                };
                record_jwks_fetch(status, start.elapsed());
                tracing::error!(target: "authgw.auth.jwks", error = %e, "Failed to fetch JWKS");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn rsa_jwk(kid: &str) -> Jwk {
        Jwk {
            kid: kid.to_string(),
            kty: "RSA".to_string(),
            alg: Some("RS256".to_string()),
            key_use: Some("sig".to_string()),
            n: Some("sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri".to_string()),
            e: Some("AQAB".to_string()),
        }
    }

    /// Fetcher that counts calls and serves whatever keys it currently holds.
    pub(crate) struct StubFetcher {
        calls: AtomicUsize,
        failing: AtomicBool,
        delay: Duration,
        keys: std::sync::Mutex<Vec<Jwk>>,
    }

    impl StubFetcher {
        pub(crate) fn new(keys: Vec<Jwk>) -> Self {
            Self::with_delay(keys, Duration::ZERO)
        }

        pub(crate) fn with_delay(keys: Vec<Jwk>, delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                delay,
                keys: std::sync::Mutex::new(keys),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn set_keys(&self, keys: Vec<Jwk>) {
            *self.keys.lock().unwrap() = keys;
        }

        pub(crate) fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl JwksFetcher for StubFetcher {
        async fn fetch(&self) -> Result<Vec<Jwk>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(FetchError::Status(503));
            }
            Ok(self.keys.lock().unwrap().clone())
        }
    }

    fn cache(fetcher: &Arc<StubFetcher>, clock: &Arc<ManualClock>) -> KeyCache {
        KeyCache::new(
            Arc::clone(fetcher) as Arc<dyn JwksFetcher>,
            Arc::clone(clock) as Arc<dyn Clock>,
            KeyCacheConfig::default(),
        )
    }

    // -------------------------------------------------------------------------
    // Deserialization
    // -------------------------------------------------------------------------

    #[test]
    fn test_jwk_deserialization() {
        let json = r#"{
            "alg": "RS256",
            "e": "AQAB",
            "kid": "abcdefghijklmnopqrstuvwxyz=",
            "kty": "RSA",
            "n": "lsjhglskjhgslkjgh43lj5h34lkjh34lkjht3example",
            "use": "sig"
        }"#;

        let jwk: Jwk = serde_json::from_str(json).unwrap();

        assert_eq!(jwk.kid, "abcdefghijklmnopqrstuvwxyz=");
        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.alg.as_deref(), Some("RS256"));
        assert_eq!(jwk.key_use.as_deref(), Some("sig"));
        assert_eq!(jwk.e.as_deref(), Some("AQAB"));
        assert!(jwk.n.is_some());
    }

    #[test]
    fn test_jwk_deserialization_minimal() {
        let jwk: Jwk = serde_json::from_str(r#"{"kty": "EC", "kid": "k2"}"#).unwrap();

        assert_eq!(jwk.kty, "EC");
        assert!(jwk.alg.is_none());
        assert!(jwk.n.is_none());
        assert!(jwk.e.is_none());
    }

    #[test]
    fn test_key_set_find() {
        let set = KeySet::new(vec![rsa_jwk("a"), rsa_jwk("b")], Instant::now());

        assert_eq!(set.len(), 2);
        assert_eq!(set.find("b").unwrap().kid, "b");
        assert!(set.find("c").is_none());
    }

    // -------------------------------------------------------------------------
    // KeyCache
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_fresh_cache_does_not_fetch() {
        let fetcher = Arc::new(StubFetcher::new(vec![rsa_jwk("k1")]));
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&fetcher, &clock);

        let first = cache.get_key_set().await.unwrap();
        assert_eq!(fetcher.calls(), 1);

        clock.advance(Duration::from_secs(60 * 60));
        let second = cache.get_key_set().await.unwrap();

        assert_eq!(fetcher.calls(), 1, "fresh cache must not fetch");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_expired_cache_refetches() {
        let fetcher = Arc::new(StubFetcher::new(vec![rsa_jwk("k1")]));
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&fetcher, &clock);

        cache.get_key_set().await.unwrap();
        fetcher.set_keys(vec![rsa_jwk("k2")]);
        clock.advance(DEFAULT_CACHE_TTL + Duration::from_secs(1));

        let set = cache.get_key_set().await.unwrap();

        assert_eq!(fetcher.calls(), 2);
        assert!(set.find("k2").is_some());
        assert!(set.find("k1").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let fetcher = Arc::new(StubFetcher::with_delay(
            vec![rsa_jwk("k1")],
            Duration::from_millis(50),
        ));
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&fetcher, &clock);

        let (a, b) = tokio::join!(cache.get_key_set(), cache.get_key_set());

        assert_eq!(fetcher.calls(), 1);
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    }

    #[tokio::test]
    async fn test_concurrent_callers_on_stale_cache_share_one_fetch() {
        let fetcher = Arc::new(StubFetcher::with_delay(
            vec![rsa_jwk("k1")],
            Duration::from_millis(50),
        ));
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&fetcher, &clock);

        cache.get_key_set().await.unwrap();
        clock.advance(DEFAULT_CACHE_TTL + Duration::from_secs(1));

        let (a, b) = tokio::join!(cache.get_key_set(), cache.get_key_set());

        assert_eq!(fetcher.calls(), 2, "one initial fetch plus one refresh");
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    }

    #[tokio::test]
    async fn test_failed_refresh_serves_stale_set_within_bound() {
        let fetcher = Arc::new(StubFetcher::new(vec![rsa_jwk("k1")]));
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&fetcher, &clock);

        let original = cache.get_key_set().await.unwrap();
        fetcher.set_failing(true);
        clock.advance(DEFAULT_CACHE_TTL + Duration::from_secs(1));

        let served = cache.get_key_set().await.unwrap();

        assert_eq!(fetcher.calls(), 2);
        assert!(Arc::ptr_eq(&original, &served));
    }

    #[tokio::test]
    async fn test_degraded_mode_spaces_out_fetch_attempts() {
        let fetcher = Arc::new(StubFetcher::new(vec![rsa_jwk("k1")]));
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&fetcher, &clock);

        cache.get_key_set().await.unwrap();
        fetcher.set_failing(true);
        clock.advance(DEFAULT_CACHE_TTL + Duration::from_secs(1));

        cache.get_key_set().await.unwrap();
        cache.get_key_set().await.unwrap();
        assert_eq!(fetcher.calls(), 2, "second stale read within interval must not fetch");

        clock.advance(DEFAULT_MIN_REFRESH_INTERVAL);
        cache.get_key_set().await.unwrap();
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_failed_refresh_beyond_stale_bound_errors() {
        let fetcher = Arc::new(StubFetcher::new(vec![rsa_jwk("k1")]));
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&fetcher, &clock);

        cache.get_key_set().await.unwrap();
        fetcher.set_failing(true);
        clock.advance(DEFAULT_MAX_STALE + Duration::from_secs(1));

        let result = cache.get_key_set().await;

        assert!(matches!(result, Err(FetchError::Status(503))));
    }

    #[tokio::test]
    async fn test_empty_cache_fetch_failure_errors() {
        let fetcher = Arc::new(StubFetcher::new(vec![]));
        fetcher.set_failing(true);
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&fetcher, &clock);

        assert!(cache.get_key_set().await.is_err());
        assert!(cache.get_key_set().await.is_err());
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_returns_newer_set_without_fetching() {
        let fetcher = Arc::new(StubFetcher::new(vec![rsa_jwk("k1")]));
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&fetcher, &clock);

        let seen = cache.get_key_set().await.unwrap();
        clock.advance(Duration::from_secs(60));
        fetcher.set_keys(vec![rsa_jwk("k2")]);
        let newer = cache.force_refresh(Some(&seen)).await.unwrap();
        assert_eq!(fetcher.calls(), 2);

        // A caller still holding the old set piggybacks on the refresh above.
        let coalesced = cache.force_refresh(Some(&seen)).await.unwrap();

        assert_eq!(fetcher.calls(), 2);
        assert!(Arc::ptr_eq(&newer, &coalesced));
    }

    #[tokio::test]
    async fn test_force_refresh_right_after_fetch_still_fetches() {
        let fetcher = Arc::new(StubFetcher::new(vec![rsa_jwk("k1")]));
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&fetcher, &clock);

        let seen = cache.get_key_set().await.unwrap();
        clock.advance(Duration::from_secs(1));
        fetcher.set_keys(vec![rsa_jwk("k1"), rsa_jwk("k2")]);

        let refreshed = cache.force_refresh(Some(&seen)).await.unwrap();

        assert_eq!(fetcher.calls(), 2);
        assert!(refreshed.find("k2").is_some());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_failed_fetch() {
        let fetcher = Arc::new(StubFetcher::with_delay(vec![], Duration::from_millis(50)));
        fetcher.set_failing(true);
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&fetcher, &clock);

        let (a, b, c) = tokio::join!(
            cache.get_key_set(),
            cache.get_key_set(),
            cache.get_key_set()
        );

        assert_eq!(fetcher.calls(), 1);
        for result in [a, b, c] {
            assert!(matches!(result, Err(FetchError::Status(503))));
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_past_stale_bound_share_one_failed_fetch() {
        let fetcher = Arc::new(StubFetcher::with_delay(
            vec![rsa_jwk("k1")],
            Duration::from_millis(50),
        ));
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&fetcher, &clock);

        cache.get_key_set().await.unwrap();
        fetcher.set_failing(true);
        clock.advance(DEFAULT_MAX_STALE + Duration::from_secs(1));

        let (a, b) = tokio::join!(cache.get_key_set(), cache.get_key_set());

        assert_eq!(fetcher.calls(), 2, "one initial fetch plus one failed refresh");
        assert!(a.is_err());
        assert!(b.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_forced_refreshes_share_one_failed_fetch() {
        let fetcher = Arc::new(StubFetcher::with_delay(
            vec![rsa_jwk("k1")],
            Duration::from_millis(50),
        ));
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&fetcher, &clock);

        let seen = cache.get_key_set().await.unwrap();
        fetcher.set_failing(true);

        let (a, b) = tokio::join!(
            cache.force_refresh(Some(&seen)),
            cache.force_refresh(Some(&seen))
        );

        assert_eq!(fetcher.calls(), 2);
        assert!(matches!(a, Err(FetchError::Status(503))));
        assert!(matches!(b, Err(FetchError::Status(503))));
    }

    #[tokio::test]
    async fn test_sequential_failures_each_retry() {
        let fetcher = Arc::new(StubFetcher::new(vec![rsa_jwk("k1")]));
        fetcher.set_failing(true);
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&fetcher, &clock);

        assert!(cache.get_key_set().await.is_err());
        fetcher.set_failing(false);

        assert!(cache.get_key_set().await.is_ok());
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_on_empty_cache_fetches() {
        let fetcher = Arc::new(StubFetcher::new(vec![rsa_jwk("k1")]));
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&fetcher, &clock);

        let set = cache.force_refresh(None).await.unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert!(set.find("k1").is_some());
    }

    // -------------------------------------------------------------------------
    // HttpJwksFetcher
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_http_fetcher_parses_key_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "keys": [
                    {"kid": "k1", "kty": "RSA", "alg": "RS256", "use": "sig", "n": "abc", "e": "AQAB"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpJwksFetcher::new(
            format!("{}/.well-known/jwks.json", server.uri()),
            Duration::from_secs(2),
        );
        let keys = fetcher.fetch().await.unwrap();

        assert_eq!(keys.len(), 1);
        assert_eq!(keys.first().unwrap().kid, "k1");
    }

    #[tokio::test]
    async fn test_http_fetcher_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = HttpJwksFetcher::new(server.uri(), Duration::from_secs(2));

        assert!(matches!(fetcher.fetch().await, Err(FetchError::Status(500))));
    }

    #[tokio::test]
    async fn test_http_fetcher_maps_unparseable_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let fetcher = HttpJwksFetcher::new(server.uri(), Duration::from_secs(2));

        assert!(matches!(fetcher.fetch().await, Err(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_http_fetcher_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"keys": []}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let fetcher = HttpJwksFetcher::new(server.uri(), Duration::from_millis(100));

        assert!(matches!(fetcher.fetch().await, Err(FetchError::Timeout)));
    }
}
