//! Session resolution.

use std::convert::Infallible;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::jwt::validate_session_token;
use crate::api::AppState;

/// Cookie carrying the session token for browser clients.
pub const SESSION_COOKIE: &str = "session";

/// A verified session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Resolves the session of a request, if any.
///
/// Invalid or expired credentials resolve to `None`; callers decide whether
/// a session is required.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Option<Session>;
}

/// Verifies HS256 session tokens from the `Authorization` header or the
/// session cookie.
#[derive(Clone)]
pub struct JwtSessionProvider {
    secret: String,
}

impl JwtSessionProvider {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

/// Extracts the raw session token, preferring a bearer token over the cookie.
fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl SessionProvider for JwtSessionProvider {
    async fn resolve(&self, headers: &HeaderMap) -> Option<Session> {
        let token = session_token(headers)?;

        let claims = match validate_session_token(&token, &self.secret) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "Ignoring invalid session token");
                return None;
            }
        };

        let Ok(user_id) = claims.sub.parse::<Uuid>() else {
            debug!("Session token subject is not a UUID");
            return None;
        };

        Some(Session {
            user_id,
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_default(),
        })
    }
}

/// The session of the current request, absent for anonymous callers.
///
/// Reuses the session resolved by the rate limit guard when it ran; resolves
/// it otherwise.
///
/// ```ignore
/// async fn handler(State(state): State<AppState>, CurrentSession(session): CurrentSession) {
///     let ctx = require_auth(state.users.as_ref(), session).await?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Option<Session>);

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(current) = parts.extensions.get::<Self>() {
            return Ok(current.clone());
        }
        Ok(Self(state.sessions.resolve(&parts.headers).await))
    }
}
