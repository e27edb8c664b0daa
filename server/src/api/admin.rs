//! Admin review of user accounts.

use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::AppState;
use crate::auth::{require_admin, CurrentSession, Session};
use crate::db::{Role, User};
use crate::error::{AppError, AuthorizationError, PersistenceError};

/// Role assignment request.
#[derive(Debug, Deserialize, Validate)]
pub struct SetRolesRequest {
    #[validate(length(min = 1))]
    pub roles: Vec<Role>,
}

/// Parses a user id path segment without echoing it back on failure.
fn parse_user_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| {
        PersistenceError::Cast {
            path: "id".to_string(),
        }
        .into()
    })
}

/// GET /api/admin/users/{id}
#[tracing::instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    require_admin(state.users.as_ref(), session).await?;
    let id = parse_user_id(&id)?;

    let user = state
        .users
        .find_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(Json(user))
}

/// POST /api/admin/users/{id}/ban
#[tracing::instrument(skip_all)]
pub async fn ban_user(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    set_banned(state, session, &id, true).await
}

/// DELETE /api/admin/users/{id}/ban
#[tracing::instrument(skip_all)]
pub async fn unban_user(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    set_banned(state, session, &id, false).await
}

async fn set_banned(
    state: AppState,
    session: Option<Session>,
    raw_id: &str,
    banned: bool,
) -> Result<Json<User>, AppError> {
    let ctx = require_admin(state.users.as_ref(), session).await?;
    let id = parse_user_id(raw_id)?;

    if id == ctx.user.id {
        return Err(AuthorizationError::Forbidden("You cannot ban your own account".into()).into());
    }

    let user = state
        .users
        .set_banned(id, banned)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    info!(admin_id = %ctx.user.id, user_id = %id, banned, "User ban state changed");
    Ok(Json(user))
}

/// PUT /api/admin/users/{id}/roles
#[tracing::instrument(skip_all)]
pub async fn set_roles(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<String>,
    WithRejection(Json(body), _): WithRejection<Json<SetRolesRequest>, AppError>,
) -> Result<Json<User>, AppError> {
    let ctx = require_admin(state.users.as_ref(), session).await?;
    let id = parse_user_id(&id)?;
    body.validate()?;

    if id == ctx.user.id && !body.roles.contains(&Role::Admin) {
        return Err(
            AuthorizationError::Forbidden("You cannot remove your own admin role".into()).into(),
        );
    }

    let mut roles = body.roles;
    roles.sort_by_key(Role::as_str);
    roles.dedup();

    let user = state
        .users
        .set_roles(id, &roles)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    info!(admin_id = %ctx.user.id, user_id = %id, roles = ?user.roles, "User roles changed");
    Ok(Json(user))
}
