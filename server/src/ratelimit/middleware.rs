//! Axum middleware for rate limiting.
//!
//! Authenticated callers are limited by user id, everyone else by client
//! address. The tier comes from request extensions, set by [`with_tier`].

use std::future::Future;
use std::pin::Pin;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::api::AppState;
use crate::auth::CurrentSession;
use crate::ratelimit::{
    resolve_identifier, RateLimitError, RateLimitResult, RateLimitTier, HEADER_LIMIT,
    HEADER_REMAINING, HEADER_RESET, HEADER_RETRY_AFTER,
};

/// Enforces the tier limit for the current caller.
///
/// # Usage
///
/// ```ignore
/// Router::new()
///     .route("/feedback", post(create_feedback))
///     .layer(from_fn_with_state(state.clone(), with_rate_limit))
///     .layer(from_fn(with_tier(RateLimitTier::FeedbackPost)));
/// ```
///
/// # Behavior
///
/// - Resolves the session once and stores it as [`CurrentSession`] for handlers.
/// - Unauthenticated callers get the tier's anonymous limit when one exists.
/// - Denied requests get `429 Too Many Requests` and never reach the handler.
/// - Allowed requests get the rate limit headers merged into the handler's
///   response, whatever its status.
#[tracing::instrument(skip(state, request, next), fields(path = %request.uri().path()))]
pub async fn with_rate_limit(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let tier = request
        .extensions()
        .get::<RateLimitTier>()
        .copied()
        .unwrap_or(RateLimitTier::Api);

    let session = state.sessions.resolve(request.headers()).await;
    let user_id = session.as_ref().map(|s| s.user_id.to_string());
    let identifier = resolve_identifier(request.headers(), user_id.as_deref());

    debug!(tier = %tier, identifier = %identifier, "Checking rate limit");

    let result = state
        .rate_limiter
        .check_tier(tier, &identifier, session.is_some())
        .await?;

    if !result.success {
        debug!(
            tier = %tier,
            identifier = %identifier,
            retry_after = result.retry_after,
            "Rate limit exceeded"
        );
        return Err(RateLimitError::LimitExceeded(result));
    }

    request.extensions_mut().insert(CurrentSession(session));

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &result);
    Ok(response)
}

/// Writes the informational rate limit headers.
///
/// `Retry-After` is only written for denials.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    headers.insert(HEADER_LIMIT, HeaderValue::from(result.limit));
    headers.insert(HEADER_REMAINING, HeaderValue::from(result.remaining));
    if let Ok(v) = HeaderValue::from_str(&result.reset_iso8601()) {
        headers.insert(HEADER_RESET, v);
    }
    if let Some(retry_after) = result.retry_after {
        headers.insert(HEADER_RETRY_AFTER, HeaderValue::from(retry_after));
    }
}

/// Sets the rate limit tier for a downstream [`with_rate_limit`].
///
/// Apply it as the outer layer so it runs first:
///
/// ```ignore
/// let route = get(handler)
///     .layer(from_fn_with_state(state.clone(), with_rate_limit))
///     .layer(from_fn(with_tier(RateLimitTier::Admin)));
/// ```
pub fn with_tier(
    tier: RateLimitTier,
) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send>>
       + Clone
       + Send
       + Sync
       + 'static {
    move |mut request: Request, next: Next| {
        request.extensions_mut().insert(tier);
        Box::pin(async move { next.run(request).await })
    }
}
