//! Rate limiting error types for HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::ratelimit::{apply_rate_limit_headers, RateLimitResult};

/// Errors that can occur during rate limit checks.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The durable store could not be reached in time.
    #[error("rate limit store unavailable: {0}")]
    StoreUnavailable(String),
    /// Request exceeded the rate limit.
    #[error("rate limit exceeded")]
    LimitExceeded(RateLimitResult),
}

/// JSON response body for rate limit denials.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitErrorResponse {
    /// Short error title.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// Seconds to wait before retrying.
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        match self {
            Self::StoreUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "error": "Service Unavailable",
                    "message": "Rate limiting is temporarily unavailable. Please try again later."
                })),
            )
                .into_response(),
            Self::LimitExceeded(result) => {
                let retry_after = result.retry_after.unwrap_or(1);
                let body = RateLimitErrorResponse {
                    error: "Too Many Requests",
                    message: format!(
                        "Rate limit exceeded. Please try again in {retry_after} seconds."
                    ),
                    retry_after,
                };
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                apply_rate_limit_headers(response.headers_mut(), &result);
                response
            }
        }
    }
}
