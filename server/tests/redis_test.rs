//! Redis-backed rate limiting tests.
//!
//! These tests require a running Redis instance at `redis://localhost:6380`.
//! Run with: `cargo test --test redis_test -- --ignored --nocapture`

use std::sync::Arc;
use std::time::Duration;

use fred::prelude::{Client, Config as RedisConfig, LuaInterface};
use wiki_server::config::Config;
use wiki_server::db;
use wiki_server::ratelimit::{
    Identifier, LimitConfig, ManualClock, RateLimitConfig, RateLimitStore, RateLimitTier,
    RateLimiter, RedisStore,
};

const START_MS: u64 = 1_700_000_040_000;

async fn create_test_store() -> RedisStore {
    let config = Config::default_for_test();
    let url = config.redis_url.expect("test config has a Redis URL");
    let client = db::create_redis_client(&url)
        .await
        .expect("Failed to connect to Redis");
    let store = RedisStore::new(client, Duration::from_millis(500));
    store.init().await.expect("Failed to load Lua script");
    store
}

/// Unique prefix so parallel runs do not share counters.
fn test_config() -> RateLimitConfig {
    RateLimitConfig {
        key_prefix: format!("test:rl:{}", uuid::Uuid::new_v4()),
        fail_open: false,
        ..RateLimitConfig::default()
    }
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_redis_counts_within_window() {
    let clock = ManualClock::new(START_MS);
    let limiter = RateLimiter::new(
        Arc::new(create_test_store().await),
        Arc::new(clock.clone()),
        test_config(),
    );
    let cfg = LimitConfig::new(3, 60).unwrap();
    let id = Identifier::ip("198.51.100.1");

    for expected in [2, 1, 0] {
        let result = limiter.check(RateLimitTier::Api, &cfg, &id).await.unwrap();
        assert!(result.success);
        assert_eq!(result.remaining, expected);
        assert_eq!(result.reset, START_MS + 60_000);
    }

    let denied = limiter.check(RateLimitTier::Api, &cfg, &id).await.unwrap();
    assert!(!denied.success);
    assert_eq!(denied.retry_after, Some(60));

    clock.advance_secs(60);
    let result = limiter.check(RateLimitTier::Api, &cfg, &id).await.unwrap();
    assert!(result.success);
    assert_eq!(result.remaining, 2);
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_redis_recovers_from_script_flush() {
    let store = create_test_store().await;
    let cfg = LimitConfig::new(5, 60).unwrap();
    let key = format!("test:rl:{}:api:ip:198.51.100.2", uuid::Uuid::new_v4());

    store.hit(&key, &cfg, START_MS).await.unwrap();

    let config = Config::default_for_test();
    let client = db::create_redis_client(&config.redis_url.unwrap())
        .await
        .unwrap();
    let _: () = client.script_flush(false).await.unwrap();

    let result = store.hit(&key, &cfg, START_MS).await.unwrap();
    assert_eq!(result.remaining, 3);
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_unreachable_redis_fails_open() {
    // Nothing listens on this port; the client never connects
    let client = Client::new(
        RedisConfig::from_url("redis://127.0.0.1:1").unwrap(),
        None,
        None,
        None,
    );
    let store = RedisStore::new(client, Duration::from_millis(50));
    let limiter = RateLimiter::new(
        Arc::new(store),
        Arc::new(ManualClock::new(START_MS)),
        RateLimitConfig::default(),
    );

    let result = limiter
        .check(
            RateLimitTier::Api,
            &LimitConfig::new(5, 60).unwrap(),
            &Identifier::ip("198.51.100.3"),
        )
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.remaining, 5);
}
