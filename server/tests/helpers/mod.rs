//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for sending requests through the full axum router with
//! in-memory stores and a manually driven clock, plus utilities for user
//! creation and session tokens.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use wiki_server::api::{create_router, AppState, AppStateConfig};
use wiki_server::auth::jwt;
use wiki_server::config::{Config, Environment};
use wiki_server::db::{MemoryDb, Role, User, UserStore};
use wiki_server::ratelimit::{ManualClock, MemoryStore, RateLimitConfig, RateLimiter};

/// Start of a 60 second window, far from any boundary surprises.
pub const START_MS: u64 = 1_700_000_040_000;

/// Full application router over in-memory state.
pub struct TestApp {
    pub router: Router,
    pub db: Arc<MemoryDb>,
    pub clock: ManualClock,
    pub config: Config,
}

impl TestApp {
    /// App with default rate limits in the test environment.
    pub fn new() -> Self {
        Self::build(Config::default_for_test(), RateLimitConfig::default())
    }

    /// App with custom rate limit configuration.
    pub fn with_rate_limits(rl_config: RateLimitConfig) -> Self {
        Self::build(Config::default_for_test(), rl_config)
    }

    /// App rendering errors the production way.
    pub fn production() -> Self {
        let config = Config {
            environment: Environment::Production,
            ..Config::default_for_test()
        };
        Self::build(config, RateLimitConfig::default())
    }

    fn build(config: Config, rl_config: RateLimitConfig) -> Self {
        let db = Arc::new(MemoryDb::new());
        let clock = ManualClock::new(START_MS);
        let limiter = RateLimiter::new(
            Arc::new(MemoryStore::new()),
            Arc::new(clock.clone()),
            rl_config,
        );

        let state = AppState::new(AppStateConfig {
            config: config.clone(),
            rate_limiter: limiter,
            users: db.clone(),
            feedback: db.clone(),
            sessions: None,
        });

        Self {
            router: create_router(state),
            db,
            clock,
            config,
        }
    }

    /// Send a request through the router.
    pub async fn request(&self, req: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(req)
            .await
            .expect("router is infallible")
    }

    /// Create a user and return it with a valid session token.
    pub async fn create_user(&self, username: &str, roles: &[Role]) -> (User, String) {
        let user = User::new(username, roles.to_vec());
        self.db
            .create_user(&user)
            .await
            .expect("Failed to create test user");
        let token = self.token_for(&user);
        (user, token)
    }

    pub fn token_for(&self, user: &User) -> String {
        jwt::create_session_token(user.id, &self.config.session_secret, 3600)
            .expect("Failed to sign test token")
    }
}

/// Builder for test requests.
pub struct TestRequest {
    builder: axum::http::request::Builder,
    body: Body,
}

impl TestRequest {
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            builder: Request::builder().method(method).uri(uri),
            body: Body::empty(),
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: &str) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn patch(uri: &str) -> Self {
        Self::new(Method::PATCH, uri)
    }

    pub fn put(uri: &str) -> Self {
        Self::new(Method::PUT, uri)
    }

    pub fn delete(uri: &str) -> Self {
        Self::new(Method::DELETE, uri)
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.builder = self
            .builder
            .header(header::AUTHORIZATION, format!("Bearer {token}"));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    pub fn json(mut self, value: &serde_json::Value) -> Self {
        self.builder = self
            .builder
            .header(header::CONTENT_TYPE, "application/json");
        self.body = Body::from(value.to_string());
        self
    }

    /// Raw body with a JSON content type, for malformed payload tests.
    pub fn raw_json(mut self, body: &'static str) -> Self {
        self.builder = self
            .builder
            .header(header::CONTENT_TYPE, "application/json");
        self.body = Body::from(body);
        self
    }

    pub fn build(self) -> Request<Body> {
        self.builder.body(self.body).expect("Failed to build request")
    }
}

/// Collect a response body as JSON.
pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// Read a header as a string.
pub fn header_str<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}
