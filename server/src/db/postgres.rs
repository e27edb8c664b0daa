//! `PostgreSQL` implementation of the stores.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::store::{FeedbackStore, StoreResult, UserStore};
use super::{Feedback, NewFeedback, Role, User, UserRow};

const USER_COLUMNS: &str = "id, username, is_banned, roles, created_at, updated_at";

/// Attaches query context to the debug log before the error is classified.
macro_rules! db_error {
    ($query:expr, $($field:tt)*) => {
        |e: sqlx::Error| {
            debug!(query = $query, $($field)*, error = %e, "Database query failed");
            e
        }
    };
}

/// Stores backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn role_names(roles: &[Role]) -> Vec<String> {
    roles.iter().map(ToString::to_string).collect()
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error!("find_user_by_id", user_id = %id))?;
        Ok(row.map(User::from))
    }

    async fn create_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (id, username, is_banned, roles, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(user.is_banned)
        .bind(role_names(&user.roles))
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error!("create_user", username = %user.username))?;
        Ok(())
    }

    async fn update_username(&self, id: Uuid, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET username = $2, updated_at = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(username)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error!("update_username", user_id = %id))?;
        Ok(row.map(User::from))
    }

    async fn set_banned(&self, id: Uuid, banned: bool) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET is_banned = $2, updated_at = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(banned)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error!("set_banned", user_id = %id))?;
        Ok(row.map(User::from))
    }

    async fn set_roles(&self, id: Uuid, roles: &[Role]) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET roles = $2, updated_at = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role_names(roles))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error!("set_roles", user_id = %id))?;
        Ok(row.map(User::from))
    }
}

#[async_trait]
impl FeedbackStore for PgStore {
    async fn create_feedback(&self, feedback: NewFeedback) -> StoreResult<Feedback> {
        let feedback = feedback.into_feedback();
        sqlx::query(
            "INSERT INTO feedback (id, user_id, category, message, page, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(feedback.id)
        .bind(feedback.user_id)
        .bind(feedback.category)
        .bind(&feedback.message)
        .bind(&feedback.page)
        .bind(feedback.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error!("create_feedback", feedback_id = %feedback.id))?;
        Ok(feedback)
    }

    async fn list_feedback(&self, limit: i64) -> StoreResult<Vec<Feedback>> {
        let rows = sqlx::query_as::<_, Feedback>(
            "SELECT id, user_id, category, message, page, created_at
             FROM feedback ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error!("list_feedback", limit = limit))?;
        Ok(rows)
    }
}
