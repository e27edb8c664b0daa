//! API Router and Application State
//!
//! Central routing configuration and shared state.

mod admin;
mod feedback;
mod users;

use std::sync::Arc;

use axum::{
    extract::State,
    handler::Handler,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    auth::{JwtSessionProvider, SessionProvider},
    config::Config,
    db::{FeedbackStore, UserStore},
    error::{error_envelope, ErrorClassifier},
    ratelimit::{with_rate_limit, with_tier, RateLimitTier, RateLimiter},
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Rate limiter, backend chosen at startup
    pub rate_limiter: RateLimiter,
    /// Session verification
    pub sessions: Arc<dyn SessionProvider>,
    pub users: Arc<dyn UserStore>,
    pub feedback: Arc<dyn FeedbackStore>,
    /// Error rendering for the configured environment
    pub errors: ErrorClassifier,
}

/// Parameters for building [`AppState`].
pub struct AppStateConfig {
    pub config: Config,
    pub rate_limiter: RateLimiter,
    pub users: Arc<dyn UserStore>,
    pub feedback: Arc<dyn FeedbackStore>,
    /// Session provider; JWT verification with the session secret when `None`
    pub sessions: Option<Arc<dyn SessionProvider>>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(cfg: AppStateConfig) -> Self {
        let sessions = cfg.sessions.unwrap_or_else(|| {
            Arc::new(JwtSessionProvider::new(cfg.config.session_secret.clone()))
                as Arc<dyn SessionProvider>
        });
        Self {
            errors: ErrorClassifier::new(cfg.config.environment),
            config: Arc::new(cfg.config),
            rate_limiter: cfg.rate_limiter,
            sessions,
            users: cfg.users,
            feedback: cfg.feedback,
        }
    }
}

/// Wraps a handler in the rate limit guard for `tier`.
///
/// Layered on the handler rather than the method router, so requests for
/// unrouted methods (405) never reach the limiter.
fn limited<H, T>(handler: H, state: &AppState, tier: RateLimitTier) -> impl Handler<T, AppState>
where
    H: Handler<T, AppState>,
    T: 'static,
{
    handler
        .layer(from_fn_with_state(state.clone(), with_rate_limit))
        .layer(from_fn(with_tier(tier)))
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Account
        .route(
            "/api/users/me",
            get(limited(users::get_me, &state, RateLimitTier::Api)).patch(limited(
                users::update_me,
                &state,
                RateLimitTier::UserUpdate,
            )),
        )
        // Feedback, anonymous submissions allowed
        .route(
            "/api/feedback",
            post(limited(
                feedback::create_feedback,
                &state,
                RateLimitTier::FeedbackPost,
            ))
            .get(limited(
                feedback::list_feedback,
                &state,
                RateLimitTier::FeedbackGet,
            )),
        )
        // Admin review
        .route(
            "/api/admin/users/{id}",
            get(limited(admin::get_user, &state, RateLimitTier::Admin)),
        )
        .route(
            "/api/admin/users/{id}/ban",
            post(limited(admin::ban_user, &state, RateLimitTier::Admin)).delete(limited(
                admin::unban_user,
                &state,
                RateLimitTier::Admin,
            )),
        )
        .route(
            "/api/admin/users/{id}/roles",
            put(limited(admin::set_roles, &state, RateLimitTier::Admin)),
        )
        // Middleware
        .layer(from_fn_with_state(state.clone(), error_envelope))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // State
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// Whether rate limiting is enabled
    rate_limiting: bool,
    /// Active rate limit backend
    rate_limit_backend: &'static str,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        rate_limiting: state.rate_limiter.config().enabled,
        rate_limit_backend: state.rate_limiter.backend(),
    })
}
