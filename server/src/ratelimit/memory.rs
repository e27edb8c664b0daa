//! In-process counter store.
//!
//! Buckets live in a `DashMap`, so the decrement runs under the shard lock of
//! its key. State is per process: with more than one server instance each
//! replica enforces its own budget, so horizontally scaled deployments must
//! use the Redis store.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::ratelimit::{
    Clock, LimitConfig, RateLimitError, RateLimitResult, RateLimitStore, Window,
    BUCKET_RETENTION, SWEEP_INTERVAL,
};

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: u32,
    reset_ms: u64,
    last_seen_ms: u64,
}

impl Bucket {
    /// A bucket is kept while its window is open or it was used recently.
    const fn is_live(&self, now_ms: u64, retention_ms: u64) -> bool {
        now_ms < self.reset_ms || now_ms.saturating_sub(self.last_seen_ms) <= retention_ms
    }
}

/// Fixed-window counters held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    buckets: Arc<DashMap<String, Bucket>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store and starts the background sweep on the current runtime.
    pub fn with_sweeper(clock: Arc<dyn Clock>) -> (Self, JoinHandle<()>) {
        let store = Self::new();
        let handle = spawn_sweeper(
            Arc::downgrade(&store.buckets),
            clock,
            SWEEP_INTERVAL,
            BUCKET_RETENTION,
        );
        (store, handle)
    }

    /// Drops buckets whose window has ended and that were not touched within
    /// `retention` of `now_ms`.
    ///
    /// Returns the number of buckets removed.
    pub fn sweep(&self, now_ms: u64, retention: Duration) -> usize {
        sweep_buckets(&self.buckets, now_ms, retention)
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

fn sweep_buckets(buckets: &DashMap<String, Bucket>, now_ms: u64, retention: Duration) -> usize {
    let retention_ms = retention.as_millis() as u64;
    let before = buckets.len();
    buckets.retain(|_, bucket| bucket.is_live(now_ms, retention_ms));
    before.saturating_sub(buckets.len())
}

/// Periodically sweeps idle buckets until the store is dropped.
fn spawn_sweeper(
    buckets: Weak<DashMap<String, Bucket>>,
    clock: Arc<dyn Clock>,
    every: Duration,
    retention: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // First tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(buckets) = buckets.upgrade() else {
                break;
            };
            let removed = sweep_buckets(&buckets, clock.now_ms(), retention);
            if removed > 0 {
                debug!(removed, remaining = buckets.len(), "Swept idle rate limit buckets");
            }
        }
    })
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn hit(
        &self,
        key: &str,
        config: &LimitConfig,
        now_ms: u64,
    ) -> Result<RateLimitResult, RateLimitError> {
        let window = Window::at(now_ms, config);
        let bucket_key = format!("{key}:{}", window.index);

        let mut bucket = self.buckets.entry(bucket_key).or_insert(Bucket {
            tokens: config.max_requests,
            reset_ms: window.reset_ms,
            last_seen_ms: now_ms,
        });
        bucket.last_seen_ms = now_ms;

        if bucket.tokens == 0 {
            return Ok(RateLimitResult::denied(config, &window, now_ms));
        }
        bucket.tokens -= 1;
        Ok(RateLimitResult::allowed(config, &window, bucket.tokens))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
