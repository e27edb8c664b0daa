//! Rate limiting for the API.
//!
//! Fixed-window counters keyed by tier and caller, backed by Redis in
//! production and an in-process map everywhere else. Routes opt in with
//! [`with_tier`] plus [`with_rate_limit`].

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod identifier;
pub mod limiter;
pub mod memory;
pub mod middleware;
pub mod redis;
pub mod store;
pub mod types;

pub use clock::*;
pub use config::*;
pub use constants::*;
pub use error::*;
pub use identifier::*;
pub use limiter::*;
pub use memory::MemoryStore;
pub use middleware::{apply_rate_limit_headers, with_rate_limit, with_tier};
pub use redis::RedisStore;
pub use store::RateLimitStore;
pub use types::*;
