//! Maps a token's `kid` to a signing key, tolerating key rotation.
//!
//! A miss always earns one forced refresh. Kids that are still absent after
//! that refresh are remembered for `min_refresh_interval`, so a flood of
//! tokens carrying the same bogus kid costs one upstream fetch per window.

use crate::auth::error::TokenError;
use crate::auth::jwks::{Jwk, KeyCache};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::instrument;

/// Upper bound on remembered unresolvable kids.
const MAX_REJECTED_KIDS: usize = 1024;

/// Resolves key IDs against the shared [`KeyCache`].
pub struct KeyResolver {
    cache: Arc<KeyCache>,

    /// Kids that were missing after a forced refresh, keyed to when.
    rejected: Mutex<HashMap<String, Instant>>,
}

impl KeyResolver {
    pub fn new(cache: Arc<KeyCache>) -> Self {
        Self {
            cache,
            rejected: Mutex::new(HashMap::new()),
        }
    }

    /// Find the key for `kid`.
    ///
    /// On a miss, forces exactly one refresh (coalesced with any concurrent
    /// refresh) and looks again, unless the same kid already failed that
    /// check within the last `min_refresh_interval`.
    ///
    /// # Errors
    ///
    /// - `TokenError::UnknownKey` if the key is still absent after the refresh
    /// - `TokenError::Fetch` if no key set could be obtained
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn resolve(&self, kid: &str) -> Result<Jwk, TokenError> {
        let current = self.cache.get_key_set().await?;
        if let Some(key) = current.find(kid) {
            tracing::debug!(target: "authgw.auth.resolver", "JWKS cache hit");
            return Ok(key.clone());
        }

        if self.recently_rejected(kid) {
            tracing::debug!(target: "authgw.auth.resolver", "Kid missing after a recent refresh, not refreshing again");
            return Err(TokenError::UnknownKey);
        }

        tracing::debug!(target: "authgw.auth.resolver", "Key not in cached set, forcing refresh");
        let refreshed = self.cache.force_refresh(Some(&current)).await?;
        if let Some(key) = refreshed.find(kid) {
            return Ok(key.clone());
        }

        self.remember_rejected(kid);
        tracing::warn!(target: "authgw.auth.resolver", kid = %kid, "Key not found in JWKS after refresh");
        Err(TokenError::UnknownKey)
    }

    fn recently_rejected(&self, kid: &str) -> bool {
        let now = self.cache.now();
        let window = self.cache.config().min_refresh_interval;
        let rejected = self.rejected.lock().unwrap_or_else(PoisonError::into_inner);
        rejected
            .get(kid)
            .is_some_and(|at| now.saturating_duration_since(*at) < window)
    }

    fn remember_rejected(&self, kid: &str) {
        let now = self.cache.now();
        let window = self.cache.config().min_refresh_interval;
        let mut rejected = self.rejected.lock().unwrap_or_else(PoisonError::into_inner);
        if rejected.len() >= MAX_REJECTED_KIDS {
            rejected.retain(|_, at| now.saturating_duration_since(*at) < window);
            if rejected.len() >= MAX_REJECTED_KIDS {
                rejected.clear();
            }
        }
        rejected.insert(kid.to_string(), now);
    }
}
