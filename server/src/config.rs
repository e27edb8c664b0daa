//! Server Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{bail, Context, Result};
use std::env;

/// Deployment environment the process runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
    Test,
}

impl Environment {
    /// Parses `APP_ENV`. Unknown values fall back to development.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "test" => Self::Test,
            _ => Self::Development,
        }
    }

    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
            Self::Test => "test",
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080")
    pub bind_address: String,

    /// Deployment environment (`APP_ENV`)
    pub environment: Environment,

    /// `PostgreSQL` connection URL. Without it an in-memory store is used.
    pub database_url: Option<String>,

    /// Redis connection URL for the durable rate limit backend
    pub redis_url: Option<String>,

    /// HMAC secret used to verify session tokens
    pub session_secret: String,

    /// Session token lifetime in seconds (default: 86400 = 1 day)
    pub session_expiry: i64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let environment = Environment::parse(&env::var("APP_ENV").unwrap_or_default());
        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        if environment.is_production() && database_url.is_none() {
            bail!("DATABASE_URL must be set in production");
        }

        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            environment,
            database_url,
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            session_secret: env::var("SESSION_SECRET").context("SESSION_SECRET must be set")?,
            session_expiry: env::var("SESSION_EXPIRY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(86400),
        })
    }

    /// Whether the durable Redis backend should back the rate limiter.
    #[must_use]
    pub const fn wants_redis_rate_limiter(&self) -> bool {
        self.redis_url.is_some() && self.environment.is_production()
    }

    /// Create a default configuration for testing.
    ///
    /// Uses in-memory stores; Redis-backed tests expect
    /// `docker run -d --name fieldguide-test-redis -p 6380:6379 redis:7`.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".into(),
            environment: Environment::Test,
            database_url: None,
            redis_url: Some("redis://localhost:6380".into()),
            session_secret: "test-secret".into(),
            session_expiry: 3600,
        }
    }
}
