//! Authorization guards.
//!
//! Ban and role state is always re-read from the user store, so a ban or a
//! role change applies to the very next request of an existing session.

use std::fmt;

use tracing::debug;

use super::Session;
use crate::db::{Role, User, UserStore};
use crate::error::{AppError, AuthorizationError};

/// A verified caller with a fresh copy of their account.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub session: Session,
    pub user: User,
}

/// Role requirement of a guarded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredRole {
    Admin,
    AdminOrModerator,
}

impl RequiredRole {
    /// Whether `user` holds a role satisfying the requirement.
    pub fn is_met_by(&self, user: &User) -> bool {
        match self {
            Self::Admin => user.has_role(Role::Admin),
            Self::AdminOrModerator => user.has_role(Role::Admin) || user.has_role(Role::Moderator),
        }
    }
}

impl fmt::Display for RequiredRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => f.write_str("Admin"),
            Self::AdminOrModerator => f.write_str("Admin or Moderator"),
        }
    }
}

/// Requires a session whose account exists and is not banned.
pub async fn require_auth(
    users: &dyn UserStore,
    session: Option<Session>,
) -> Result<AuthContext, AppError> {
    let session = session.ok_or(AppError::Authentication)?;

    let Some(user) = users.find_user_by_id(session.user_id).await? else {
        debug!(user_id = %session.user_id, "Session refers to unknown user");
        return Err(AppError::Authentication);
    };

    if user.is_banned {
        return Err(AuthorizationError::Banned.into());
    }

    Ok(AuthContext { session, user })
}

/// Requires an authenticated caller holding `required`.
pub async fn require_role(
    users: &dyn UserStore,
    session: Option<Session>,
    required: RequiredRole,
) -> Result<AuthContext, AppError> {
    let ctx = require_auth(users, session).await?;

    if !required.is_met_by(&ctx.user) {
        debug!(user_id = %ctx.user.id, required = %required, "Missing required role");
        return Err(AuthorizationError::InsufficientPermissions { required }.into());
    }

    Ok(ctx)
}

pub async fn require_admin(
    users: &dyn UserStore,
    session: Option<Session>,
) -> Result<AuthContext, AppError> {
    require_role(users, session, RequiredRole::Admin).await
}

pub async fn require_admin_or_moderator(
    users: &dyn UserStore,
    session: Option<Session>,
) -> Result<AuthContext, AppError> {
    require_role(users, session, RequiredRole::AdminOrModerator).await
}
