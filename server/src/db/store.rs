//! Storage traits for users and feedback.

use async_trait::async_trait;
use uuid::Uuid;

use super::{Feedback, NewFeedback, Role, User};
use crate::error::PersistenceError;

pub type StoreResult<T> = Result<T, PersistenceError>;

/// Account storage. Guards read ban and role state from here on every request.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Inserts a user. Fails with `DuplicateKey` on a taken username.
    async fn create_user(&self, user: &User) -> StoreResult<()>;

    /// Renames a user, returning the updated record.
    async fn update_username(&self, id: Uuid, username: &str) -> StoreResult<Option<User>>;

    async fn set_banned(&self, id: Uuid, banned: bool) -> StoreResult<Option<User>>;

    async fn set_roles(&self, id: Uuid, roles: &[Role]) -> StoreResult<Option<User>>;
}

/// Feedback storage.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn create_feedback(&self, feedback: NewFeedback) -> StoreResult<Feedback>;

    /// Most recent feedback first.
    async fn list_feedback(&self, limit: i64) -> StoreResult<Vec<Feedback>>;
}
