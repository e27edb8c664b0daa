//! Core rate limiter service.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db;
use crate::ratelimit::{
    Clock, Identifier, LimitConfig, MemoryStore, RateLimitConfig, RateLimitError,
    RateLimitResult, RateLimitStore, RateLimitTier, RedisStore, SystemClock, TierLimits, Window,
};

/// Core rate limiter service.
///
/// Applies fixed-window limits through an injected [`RateLimitStore`].
/// Windows reset on aligned boundaries, so a caller can spend up to twice
/// the limit across a boundary (the end of one window plus the start of the
/// next). This is accepted for abuse mitigation; it is not a precise quota.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    config: Arc<RateLimitConfig>,
}

impl RateLimiter {
    /// Creates a new rate limiter over the given store.
    pub fn new(
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
        config: RateLimitConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config: Arc::new(config),
        }
    }

    /// In-memory limiter without background sweeping.
    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock), config)
    }

    /// Selects the backend for this process.
    ///
    /// Redis is used when a Redis URL is configured, the environment is
    /// production and the connection plus script load succeed. Everything
    /// else gets the in-memory store with its periodic sweep.
    pub async fn from_config(config: &Config, rl_config: RateLimitConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        if let Some(url) = config
            .redis_url
            .as_deref()
            .filter(|_| config.wants_redis_rate_limiter())
        {
            match Self::connect_redis(url, &rl_config).await {
                Ok(store) => {
                    info!(backend = "redis", "Rate limiter initialized");
                    return Self::new(Arc::new(store), clock, rl_config);
                }
                Err(e) => {
                    warn!(error = %e, "Redis rate limiter unavailable, using in-memory store");
                }
            }
        }

        let (store, _sweeper) = MemoryStore::with_sweeper(clock.clone());
        info!(backend = "memory", "Rate limiter initialized");
        Self::new(Arc::new(store), clock, rl_config)
    }

    async fn connect_redis(url: &str, rl_config: &RateLimitConfig) -> anyhow::Result<RedisStore> {
        let client = db::create_redis_client(url).await?;
        let store = RedisStore::new(client, rl_config.store_timeout);
        store.init().await?;
        Ok(store)
    }

    /// Checks and consumes one request for `identifier` under `tier`.
    ///
    /// Denial is a successful `Ok` with `success: false`. When the store is
    /// unavailable and `fail_open` is set the request is allowed with the full
    /// budget reported; with `fail_open` disabled the store error is returned.
    #[tracing::instrument(skip(self, limit))]
    pub async fn check(
        &self,
        tier: RateLimitTier,
        limit: &LimitConfig,
        identifier: &Identifier,
    ) -> Result<RateLimitResult, RateLimitError> {
        let now_ms = self.clock.now_ms();

        // Skip rate limiting if disabled or allowlisted
        if !self.config.enabled || self.is_allowed_by_config(identifier) {
            debug!(identifier = %identifier, "Bypassing rate limit");
            return Ok(RateLimitResult::unmetered(limit, &Window::at(now_ms, limit)));
        }

        let key = self.build_key(tier, identifier);
        match self.store.hit(&key, limit, now_ms).await {
            Ok(result) => Ok(result),
            Err(RateLimitError::StoreUnavailable(reason)) if self.config.fail_open => {
                warn!(
                    tier = %tier,
                    identifier = %identifier,
                    reason = %reason,
                    "Rate limit store unavailable, allowing request (fail_open=true)"
                );
                Ok(RateLimitResult::unmetered(limit, &Window::at(now_ms, limit)))
            }
            Err(e) => Err(e),
        }
    }

    /// Checks a tier, picking the anonymous variant for unauthenticated callers.
    pub async fn check_tier(
        &self,
        tier: RateLimitTier,
        identifier: &Identifier,
        is_authenticated: bool,
    ) -> Result<RateLimitResult, RateLimitError> {
        let limit = *self.tier_limits(tier).select(is_authenticated);
        self.check(tier, &limit, identifier).await
    }

    /// Returns the limits configured for a tier.
    pub fn tier_limits(&self, tier: RateLimitTier) -> &TierLimits {
        self.config.limits.get(tier)
    }

    /// Checks if the identifier is in the allowlist configuration.
    pub fn is_allowed_by_config(&self, identifier: &Identifier) -> bool {
        self.config.allowlist.contains(identifier.as_str())
    }

    /// Returns the configuration for this rate limiter.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Name of the active backend.
    pub fn backend(&self) -> &'static str {
        self.store.name()
    }

    /// Builds a store key with the configured prefix.
    fn build_key(&self, tier: RateLimitTier, identifier: &Identifier) -> String {
        format!("{}:{}:{}", self.config.key_prefix, tier.as_str(), identifier)
    }
}
