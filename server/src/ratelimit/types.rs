//! Rate limiting types.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::ratelimit::LimitConfig;

/// Named rate limit tiers applied to classes of endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitTier {
    /// Admin review endpoints
    Admin,
    /// General API reads
    Api,
    /// Profile updates
    UserUpdate,
    /// Feedback submission
    FeedbackPost,
    /// Feedback listing
    FeedbackGet,
    /// Sign-in related operations
    Auth,
}

impl RateLimitTier {
    /// Returns the string identifier for this tier (used in store keys).
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Api => "api",
            Self::UserUpdate => "user_update",
            Self::FeedbackPost => "feedback_post",
            Self::FeedbackGet => "feedback_get",
            Self::Auth => "auth",
        }
    }

    /// Suffix of the `RATE_LIMIT_<TIER>` environment override.
    pub const fn env_suffix(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Api => "API",
            Self::UserUpdate => "USER_UPDATE",
            Self::FeedbackPost => "FEEDBACK_POST",
            Self::FeedbackGet => "FEEDBACK_GET",
            Self::Auth => "AUTH",
        }
    }

    pub const fn all() -> &'static [Self] {
        &[
            Self::Admin,
            Self::Api,
            Self::UserUpdate,
            Self::FeedbackPost,
            Self::FeedbackGet,
            Self::Auth,
        ]
    }
}

impl fmt::Display for RateLimitTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub success: bool,
    /// Maximum requests allowed in the window
    pub limit: u32,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// Unix timestamp in milliseconds when the window resets
    pub reset: u64,
    /// Seconds to wait before retrying, only set on denial
    pub retry_after: Option<u64>,
}

impl RateLimitResult {
    /// An allowed result with `remaining` tokens left in `window`.
    pub const fn allowed(config: &LimitConfig, window: &Window, remaining: u32) -> Self {
        Self {
            success: true,
            limit: config.max_requests,
            remaining,
            reset: window.reset_ms,
            retry_after: None,
        }
    }

    /// A denial for `window` as observed at `now_ms`.
    pub fn denied(config: &LimitConfig, window: &Window, now_ms: u64) -> Self {
        Self {
            success: false,
            limit: config.max_requests,
            remaining: 0,
            reset: window.reset_ms,
            retry_after: Some(window.retry_after_secs(now_ms)),
        }
    }

    /// A result that did not consume budget (disabled, allowlisted or failed open).
    pub const fn unmetered(config: &LimitConfig, window: &Window) -> Self {
        Self::allowed(config, window, config.max_requests)
    }

    /// The reset boundary as an ISO-8601 timestamp.
    pub fn reset_iso8601(&self) -> String {
        DateTime::<Utc>::from_timestamp_millis(self.reset as i64)
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// A fixed window aligned to multiples of the configured interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Window index since the epoch (`floor(now / interval)`)
    pub index: u64,
    /// Window end boundary in epoch milliseconds
    pub reset_ms: u64,
}

impl Window {
    /// Computes the window that contains `now_ms`.
    pub const fn at(now_ms: u64, config: &LimitConfig) -> Self {
        let interval_ms = config.interval_ms();
        let index = now_ms / interval_ms;
        Self {
            index,
            reset_ms: (index + 1) * interval_ms,
        }
    }

    /// `ceil((reset - now) / 1000)`, at least one second.
    pub const fn retry_after_secs(&self, now_ms: u64) -> u64 {
        let remaining_ms = self.reset_ms.saturating_sub(now_ms);
        let secs = remaining_ms.div_ceil(1000);
        if secs == 0 {
            1
        } else {
            secs
        }
    }
}

/// Per-request rate limit key: `user:<id>` or `ip:<address>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn user(id: impl fmt::Display) -> Self {
        Self(format!("user:{id}"))
    }

    pub fn ip(address: impl fmt::Display) -> Self {
        Self(format!("ip:{address}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
