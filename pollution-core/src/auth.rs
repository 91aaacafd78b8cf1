//! Bearer token acquisition for the pollution API.
//!
//! A token is served from the cache until its TTL (reported lifetime minus a
//! safety buffer) runs out; the next caller then logs in again.

use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    cache::{SharedCache, TtlCache},
    config::CacheConfig,
    error::AuthError,
    model::AuthToken,
    source::{Credentials, PollutionSource},
};

const TOKEN_KEY: &str = "pollution-api-token";

/// Cache TTL for a token that lives `expires_in` seconds.
///
/// Falls back to `min_ttl` when the buffer leaves no positive lifetime.
pub fn token_ttl(expires_in: i64, buffer: Duration, min_ttl: Duration) -> Duration {
    let remaining = expires_in - buffer.as_secs() as i64;
    if remaining > 0 {
        Duration::from_secs(remaining as u64)
    } else {
        min_ttl
    }
}

#[derive(Debug)]
pub struct Authenticator {
    source: Arc<dyn PollutionSource>,
    credentials: Credentials,
    cache: SharedCache<&'static str, AuthToken>,
    buffer: Duration,
    min_ttl: Duration,
    refresh: Mutex<()>,
}

impl Authenticator {
    pub fn new(
        source: Arc<dyn PollutionSource>,
        credentials: Credentials,
        cache: SharedCache<&'static str, AuthToken>,
        cache_config: &CacheConfig,
    ) -> Self {
        Self {
            source,
            credentials,
            cache,
            buffer: Duration::from_secs(cache_config.token_buffer_secs),
            min_ttl: Duration::from_secs(cache_config.token_min_ttl_secs.max(1)),
            refresh: Mutex::new(()),
        }
    }

    pub fn token_cache() -> SharedCache<&'static str, AuthToken> {
        TtlCache::shared()
    }

    /// Returns a valid bearer token, logging in only on a cache miss.
    pub async fn get_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.cache.get(&TOKEN_KEY) {
            debug!("Using cached pollution API token");
            return Ok(token.value);
        }

        // Concurrent misses queue here; whoever wins refreshes, the rest
        // find the fresh token on the second read.
        let _guard = self.refresh.lock().await;
        if let Some(token) = self.cache.get(&TOKEN_KEY) {
            return Ok(token.value);
        }

        let token = self.login().await?;
        Ok(token.value)
    }

    async fn login(&self) -> Result<AuthToken, AuthError> {
        debug!(username = %self.credentials.username, "Logging in to pollution API");

        let response = self.source.login(&self.credentials).await?;

        let value = response
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AuthError::MalformedResponse("token is missing".into()))?;

        let expires_in = response
            .expires_in
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                AuthError::MalformedResponse("expiresIn is missing or not positive".into())
            })?;

        let token = AuthToken {
            value,
            expires_at_epoch_secs: Utc::now().timestamp() + expires_in,
        };

        let ttl = token_ttl(expires_in, self.buffer, self.min_ttl);
        info!(
            expires_in,
            cache_ttl_secs = ttl.as_secs(),
            "Obtained pollution API token"
        );
        self.cache.insert(TOKEN_KEY, token.clone(), ttl);

        Ok(token)
    }
}
