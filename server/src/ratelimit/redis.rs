//! Durable counter store using Redis.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fred::prelude::*;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::ratelimit::{
    LimitConfig, RateLimitError, RateLimitResult, RateLimitStore, Window, REDIS_KEY_CAPACITY,
};

/// Embedded Lua script for atomic increment with first-write expiry.
const RATE_LIMIT_SCRIPT: &str = include_str!("rate_limit.lua");

/// Counter store shared by every server instance through Redis.
///
/// Counters self-expire one second after their window ends, so keys never
/// accumulate.
#[derive(Clone)]
pub struct RedisStore {
    redis: Client,
    timeout: Duration,
    script_sha: Arc<RwLock<String>>,
}

impl RedisStore {
    /// Creates a new store.
    ///
    /// Call `init()` after creation to load the Lua script into Redis.
    pub fn new(redis: Client, timeout: Duration) -> Self {
        Self {
            redis,
            timeout,
            script_sha: Arc::new(RwLock::new(String::new())),
        }
    }

    /// Loads the Lua script into Redis.
    pub async fn init(&self) -> Result<(), Error> {
        self.load_script().await
    }

    /// Loads or reloads the Lua script.
    ///
    /// Called during init and when NOSCRIPT errors are encountered.
    async fn load_script(&self) -> Result<(), Error> {
        let sha: String = self.redis.script_load(RATE_LIMIT_SCRIPT).await?;
        info!(rate_limit_sha = %sha, "Lua script loaded into Redis");
        *self.script_sha.write().await = sha;
        Ok(())
    }

    /// Checks if an error is a NOSCRIPT error (script not found in Redis).
    fn is_noscript_error(error: &Error) -> bool {
        error.to_string().contains("NOSCRIPT")
    }

    /// Runs the increment script with NOSCRIPT retry.
    async fn increment(&self, key: &str, ttl_secs: u64) -> Result<i64, RateLimitError> {
        let sha = self.script_sha.read().await.clone();

        let result: Result<i64, _> = self
            .redis
            .evalsha(&sha, vec![key], vec![ttl_secs.to_string()])
            .await;

        match result {
            Ok(count) => Ok(count),
            Err(e) if Self::is_noscript_error(&e) => {
                warn!("NOSCRIPT error, reloading Lua script");
                self.load_script()
                    .await
                    .map_err(|e| RateLimitError::StoreUnavailable(e.to_string()))?;

                let new_sha = self.script_sha.read().await.clone();
                self.redis
                    .evalsha(&new_sha, vec![key], vec![ttl_secs.to_string()])
                    .await
                    .map_err(|e| RateLimitError::StoreUnavailable(e.to_string()))
            }
            Err(e) => Err(RateLimitError::StoreUnavailable(e.to_string())),
        }
    }
}

/// Builds the per-window Redis key.
pub(crate) fn window_key(key: &str, window: &Window) -> String {
    let mut out = String::with_capacity(REDIS_KEY_CAPACITY);
    out.push_str(key);
    out.push(':');
    out.push_str(&window.index.to_string());
    out
}

/// Maps a post-increment counter value to a result.
pub(crate) fn result_from_count(
    count: i64,
    config: &LimitConfig,
    window: &Window,
    now_ms: u64,
) -> RateLimitResult {
    let max = i64::from(config.max_requests);
    if count <= max {
        RateLimitResult::allowed(config, window, (max - count).max(0) as u32)
    } else {
        RateLimitResult::denied(config, window, now_ms)
    }
}

#[async_trait]
impl RateLimitStore for RedisStore {
    async fn hit(
        &self,
        key: &str,
        config: &LimitConfig,
        now_ms: u64,
    ) -> Result<RateLimitResult, RateLimitError> {
        let window = Window::at(now_ms, config);
        let redis_key = window_key(key, &window);

        let count = tokio::time::timeout(
            self.timeout,
            self.increment(&redis_key, config.interval_secs + 1),
        )
        .await
        .map_err(|_| {
            RateLimitError::StoreUnavailable(format!(
                "redis call exceeded {}ms",
                self.timeout.as_millis()
            ))
        })??;

        Ok(result_from_count(count, config, &window, now_ms))
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
