//! Rate limiting configuration.

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;

use crate::ratelimit::{RateLimitTier, DEFAULT_STORE_TIMEOUT, MAX_INTERVAL_SECS};

/// Configuration for the rate limiting system.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled
    pub enabled: bool,
    /// Prefix for store keys (e.g., "fg:rl")
    pub key_prefix: String,
    /// Whether to allow requests when the durable store is unavailable
    pub fail_open: bool,
    /// Identifiers (e.g. "ip:10.0.0.1", "user:42") that bypass rate limiting
    pub allowlist: HashSet<String>,
    /// Upper bound on a single durable store round trip
    pub store_timeout: Duration,
    /// Per-tier rate limits
    pub limits: RateLimits,
}

/// Configuration for a single rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Window duration in seconds
    pub interval_secs: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LimitConfigError {
    #[error("max_requests must be greater than zero")]
    ZeroRequests,
    #[error("interval_secs must be greater than zero")]
    ZeroInterval,
    #[error("interval_secs must not exceed {max_secs}")]
    IntervalTooLong { max_secs: u64 },
}

impl LimitConfig {
    /// Creates a limit, rejecting zero values and intervals longer than
    /// [`MAX_INTERVAL_SECS`].
    pub const fn new(max_requests: u32, interval_secs: u64) -> Result<Self, LimitConfigError> {
        if max_requests == 0 {
            return Err(LimitConfigError::ZeroRequests);
        }
        if interval_secs == 0 {
            return Err(LimitConfigError::ZeroInterval);
        }
        if interval_secs > MAX_INTERVAL_SECS {
            return Err(LimitConfigError::IntervalTooLong {
                max_secs: MAX_INTERVAL_SECS,
            });
        }
        Ok(Self {
            max_requests,
            interval_secs,
        })
    }

    /// Builds a limit from literals known to be non-zero.
    const fn fixed(max_requests: u32, interval_secs: u64) -> Self {
        Self {
            max_requests,
            interval_secs,
        }
    }

    pub const fn interval_ms(&self) -> u64 {
        self.interval_secs * 1000
    }
}

/// Limits for one tier, with an optional stricter variant for anonymous callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub authenticated: LimitConfig,
    pub anonymous: Option<LimitConfig>,
}

impl TierLimits {
    /// Same limit for everyone.
    pub const fn uniform(limit: LimitConfig) -> Self {
        Self {
            authenticated: limit,
            anonymous: None,
        }
    }

    /// Distinct limits for signed-in and anonymous callers.
    pub const fn split(authenticated: LimitConfig, anonymous: LimitConfig) -> Self {
        Self {
            authenticated,
            anonymous: Some(anonymous),
        }
    }

    /// Picks the limit for the caller, falling back to the authenticated one
    /// when no anonymous variant exists.
    pub const fn select(&self, is_authenticated: bool) -> &LimitConfig {
        match (is_authenticated, &self.anonymous) {
            (false, Some(anonymous)) => anonymous,
            _ => &self.authenticated,
        }
    }
}

/// Rate limits for each tier.
#[derive(Debug, Clone)]
pub struct RateLimits {
    pub admin: TierLimits,
    pub api: TierLimits,
    pub user_update: TierLimits,
    pub feedback_post: TierLimits,
    pub feedback_get: TierLimits,
    pub auth: TierLimits,
}

impl RateLimits {
    /// Returns the limits for a given tier.
    pub const fn get(&self, tier: RateLimitTier) -> &TierLimits {
        match tier {
            RateLimitTier::Admin => &self.admin,
            RateLimitTier::Api => &self.api,
            RateLimitTier::UserUpdate => &self.user_update,
            RateLimitTier::FeedbackPost => &self.feedback_post,
            RateLimitTier::FeedbackGet => &self.feedback_get,
            RateLimitTier::Auth => &self.auth,
        }
    }

    fn get_mut(&mut self, tier: RateLimitTier) -> &mut TierLimits {
        match tier {
            RateLimitTier::Admin => &mut self.admin,
            RateLimitTier::Api => &mut self.api,
            RateLimitTier::UserUpdate => &mut self.user_update,
            RateLimitTier::FeedbackPost => &mut self.feedback_post,
            RateLimitTier::FeedbackGet => &mut self.feedback_get,
            RateLimitTier::Auth => &mut self.auth,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key_prefix: "fg:rl".to_string(),
            fail_open: true,
            allowlist: HashSet::new(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            limits: RateLimits::default(),
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            admin: TierLimits::uniform(LimitConfig::fixed(50, 300)),
            api: TierLimits::uniform(LimitConfig::fixed(30, 60)),
            user_update: TierLimits::uniform(LimitConfig::fixed(3, 86400)),
            feedback_post: TierLimits::split(
                LimitConfig::fixed(30, 3600),
                LimitConfig::fixed(10, 3600),
            ),
            feedback_get: TierLimits::uniform(LimitConfig::fixed(60, 3600)),
            auth: TierLimits::uniform(LimitConfig::fixed(5, 900)),
        }
    }
}

impl RateLimitConfig {
    /// Creates configuration from environment variables.
    ///
    /// Environment variables:
    /// - `RATE_LIMIT_ENABLED`: Enable/disable rate limiting (default: true)
    /// - `RATE_LIMIT_PREFIX`: Store key prefix (default: "fg:rl")
    /// - `RATE_LIMIT_FAIL_OPEN`: Allow requests when Redis is unavailable (default: true)
    /// - `RATE_LIMIT_ALLOWLIST`: Comma-separated identifiers that bypass limits
    /// - `RATE_LIMIT_STORE_TIMEOUT_MS`: Redis round trip bound (default: 250)
    /// - `RATE_LIMIT_<TIER>`: Tier limit as "requests,window_secs"
    /// - `RATE_LIMIT_<TIER>_ANONYMOUS`: Anonymous variant as "requests,window_secs"
    ///
    /// `<TIER>` is one of `ADMIN`, `API`, `USER_UPDATE`, `FEEDBACK_POST`,
    /// `FEEDBACK_GET`, `AUTH`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RATE_LIMIT_ENABLED") {
            config.enabled = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_PREFIX") {
            config.key_prefix = val;
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_FAIL_OPEN") {
            config.fail_open = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_ALLOWLIST") {
            config.allowlist = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(ms) = std::env::var("RATE_LIMIT_STORE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.store_timeout = Duration::from_millis(ms);
        }

        for &tier in RateLimitTier::all() {
            let name = format!("RATE_LIMIT_{}", tier.env_suffix());
            let limits = config.limits.get_mut(tier);

            if let Ok(val) = std::env::var(&name) {
                match parse_limit_config(&val) {
                    Some(limit) => limits.authenticated = limit,
                    None => tracing::warn!(var = %name, value = %val, "Ignoring invalid rate limit override"),
                }
            }
            let anon_name = format!("{name}_ANONYMOUS");
            if let Ok(val) = std::env::var(&anon_name) {
                match parse_limit_config(&val) {
                    Some(limit) => limits.anonymous = Some(limit),
                    None => tracing::warn!(var = %anon_name, value = %val, "Ignoring invalid rate limit override"),
                }
            }
        }

        config
    }
}

/// Parses a limit config from "requests,window_secs" format.
fn parse_limit_config(val: &str) -> Option<LimitConfig> {
    let parts: Vec<&str> = val.split(',').collect();
    if parts.len() == 2 {
        let requests = parts[0].trim().parse().ok()?;
        let window_secs = parts[1].trim().parse().ok()?;
        LimitConfig::new(requests, window_secs).ok()
    } else {
        None
    }
}
