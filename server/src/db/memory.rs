//! In-memory stores for development and tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{FeedbackStore, StoreResult, UserStore};
use super::{Feedback, NewFeedback, Role, User};
use crate::error::PersistenceError;

/// Process-local user and feedback storage.
///
/// Enforces the same unique username constraint as the database schema.
/// Usernames are claimed through an index entry, so concurrent writers of the
/// same name cannot both succeed.
#[derive(Clone, Default)]
pub struct MemoryDb {
    users: Arc<DashMap<Uuid, User>>,
    usernames: Arc<DashMap<String, Uuid>>,
    feedback: Arc<RwLock<Vec<Feedback>>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `username` for `id`, failing when another user holds it.
    fn claim_username(&self, username: &str, id: Uuid) -> StoreResult<()> {
        match self.usernames.entry(username.to_string()) {
            Entry::Occupied(owner) if *owner.get() != id => Err(duplicate_username()),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(id);
                Ok(())
            }
        }
    }

    fn update<F>(&self, id: Uuid, apply: F) -> Option<User>
    where
        F: FnOnce(&mut User),
    {
        self.users.get_mut(&id).map(|mut user| {
            apply(user.value_mut());
            user.updated_at = Utc::now();
            user.value().clone()
        })
    }
}

fn duplicate_username() -> PersistenceError {
    PersistenceError::DuplicateKey {
        field: "username".to_string(),
    }
}

#[async_trait]
impl UserStore for MemoryDb {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn create_user(&self, user: &User) -> StoreResult<()> {
        self.claim_username(&user.username, user.id)?;
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_username(&self, id: Uuid, username: &str) -> StoreResult<Option<User>> {
        let Some(previous) = self.users.get(&id).map(|u| u.username.clone()) else {
            return Ok(None);
        };
        self.claim_username(username, id)?;
        if previous != username {
            self.usernames.remove_if(&previous, |_, owner| *owner == id);
        }
        Ok(self.update(id, |u| u.username = username.to_string()))
    }

    async fn set_banned(&self, id: Uuid, banned: bool) -> StoreResult<Option<User>> {
        Ok(self.update(id, |u| u.is_banned = banned))
    }

    async fn set_roles(&self, id: Uuid, roles: &[Role]) -> StoreResult<Option<User>> {
        Ok(self.update(id, |u| u.roles = roles.to_vec()))
    }
}

#[async_trait]
impl FeedbackStore for MemoryDb {
    async fn create_feedback(&self, feedback: NewFeedback) -> StoreResult<Feedback> {
        let feedback = feedback.into_feedback();
        self.feedback.write().await.push(feedback.clone());
        Ok(feedback)
    }

    async fn list_feedback(&self, limit: i64) -> StoreResult<Vec<Feedback>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .feedback
            .read()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}
