//! Rate limiting constants.

use std::time::Duration;

/// Response header carrying the active window's request limit.
pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
/// Response header carrying requests left in the current window.
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
/// Response header carrying the window end as an ISO-8601 timestamp.
pub const HEADER_RESET: &str = "X-RateLimit-Reset";
/// Seconds until the caller may retry (denials only).
pub const HEADER_RETRY_AFTER: &str = "Retry-After";

/// Proxy headers consulted for the client address, in priority order.
pub const HEADER_FORWARDED_FOR: &str = "X-Forwarded-For";
pub const HEADER_REAL_IP: &str = "X-Real-IP";

/// Identifier used when no client address can be determined.
pub const ANONYMOUS_IDENTIFIER: &str = "anonymous";

/// How often the in-memory store sweeps idle buckets.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Buckets untouched for longer than this are dropped by the sweep.
pub const BUCKET_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Longest accepted window, one year.
pub const MAX_INTERVAL_SECS: u64 = 366 * 24 * 60 * 60;

/// Default upper bound on a single Redis round trip.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(250);

/// Redis key pre-allocation size
pub const REDIS_KEY_CAPACITY: usize = 64;
