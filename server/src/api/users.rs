//! Account endpoints for the signed-in user.

use std::sync::LazyLock;

use axum::{extract::State, Json};
use axum_extra::extract::WithRejection;
use regex::Regex;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::AppState;
use crate::auth::{require_auth, CurrentSession};
use crate::db::User;
use crate::error::AppError;

/// Username validation regex (matches DB constraint).
static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]{3,32}$").unwrap());

/// Profile update request.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    /// Username (3-32 lowercase alphanumeric + underscore).
    #[validate(length(min = 3, max = 32), regex(path = "USERNAME_REGEX"))]
    pub username: String,
}

/// Current account.
///
/// GET /api/users/me
#[tracing::instrument(skip_all)]
pub async fn get_me(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<User>, AppError> {
    let ctx = require_auth(state.users.as_ref(), session).await?;
    Ok(Json(ctx.user))
}

/// Rename the current account.
///
/// PATCH /api/users/me
#[tracing::instrument(skip_all)]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    WithRejection(Json(body), _): WithRejection<Json<UpdateProfileRequest>, AppError>,
) -> Result<Json<User>, AppError> {
    let ctx = require_auth(state.users.as_ref(), session).await?;
    body.validate()?;

    let user = state
        .users
        .update_username(ctx.user.id, &body.username)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    info!(user_id = %user.id, "Username updated");
    Ok(Json(user))
}
