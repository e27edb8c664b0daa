//! Storage backends for fixed-window counters.

use async_trait::async_trait;

use crate::ratelimit::{LimitConfig, RateLimitError, RateLimitResult};

/// Counter store behind the rate limiter.
///
/// `hit` consumes one request from the window containing `now_ms` for `key`
/// and reports the outcome. Implementations must make the
/// decrement-and-compare atomic per key.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn hit(
        &self,
        key: &str,
        config: &LimitConfig,
        now_ms: u64,
    ) -> Result<RateLimitResult, RateLimitError>;

    /// Short backend name for logs and the health endpoint.
    fn name(&self) -> &'static str;
}
