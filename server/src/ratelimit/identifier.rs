//! Rate limit identifier resolution.

use axum::http::HeaderMap;

use crate::ratelimit::{Identifier, ANONYMOUS_IDENTIFIER, HEADER_FORWARDED_FOR, HEADER_REAL_IP};

/// Derive the rate limit key for a request.
///
/// Authenticated callers are keyed by account so limits follow them across
/// networks. Everyone else is keyed by the first hop of `X-Forwarded-For`,
/// then `X-Real-IP`, then the literal `anonymous`.
pub fn resolve_identifier(headers: &HeaderMap, user_id: Option<&str>) -> Identifier {
    if let Some(id) = user_id {
        return Identifier::user(id);
    }
    Identifier::ip(client_address(headers).unwrap_or(ANONYMOUS_IDENTIFIER))
}

/// Client address as reported by the fronting proxy.
pub fn client_address(headers: &HeaderMap) -> Option<&str> {
    header_value(headers, HEADER_FORWARDED_FOR)
        .and_then(|forwarded| forwarded.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
        .or_else(|| header_value(headers, HEADER_REAL_IP))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
