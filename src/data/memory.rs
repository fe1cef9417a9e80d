//! In-memory user store
//!
//! Volatile, cleared on restart. Useful for tests and for embedding the
//! service without a database file.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use super::models::User;
use super::store::{UserStore, order_by_ids, stale_version};
use crate::error::AppError;

/// User records kept in a process-local map
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new user record
    ///
    /// # Errors
    /// `Validation` if a user with the same id already exists
    pub async fn insert_user(&self, user: User) -> Result<(), AppError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(AppError::Validation(format!(
                "user {} already exists",
                user.id
            )));
        }
        users.insert(user.id.clone(), user);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

fn check_version(users: &HashMap<String, User>, user: &User) -> Result<(), AppError> {
    match users.get(&user.id) {
        None => Err(AppError::NotFound),
        Some(stored) if stored.version != user.version => {
            Err(stale_version(&user.id, user.version))
        }
        Some(_) => Ok(()),
    }
}

fn store_next_version(users: &mut HashMap<String, User>, user: &User) {
    let mut next = user.clone();
    next.version = user.version + 1;
    next.updated_at = Utc::now();
    users.insert(next.id.clone(), next);
}

impl UserStore for MemoryStore {
    async fn fetch_one(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn fetch_many(&self, ids: &[String]) -> Result<Vec<User>, AppError> {
        let users = self.users.read().await;
        let found = ids
            .iter()
            .filter_map(|id| users.get(id).cloned())
            .collect();
        Ok(order_by_ids(ids, found))
    }

    async fn overwrite(&self, user: &User) -> Result<(), AppError> {
        let mut users = self.users.write().await;
        check_version(&users, user)?;
        store_next_version(&mut users, user);
        Ok(())
    }

    async fn overwrite_all(&self, batch: &[&User]) -> Result<(), AppError> {
        let mut users = self.users.write().await;

        // Validate against a scratch copy so a repeated id in the batch
        // sees the version bumped by its earlier occurrence.
        let mut staged = HashMap::new();
        for user in batch {
            match staged.get(&user.id) {
                Some(version) if *version != user.version => {
                    return Err(stale_version(&user.id, user.version));
                }
                Some(_) => {}
                None => check_version(&users, user)?,
            }
            staged.insert(user.id.clone(), user.version + 1);
        }

        for user in batch {
            store_next_version(&mut users, user);
        }
        Ok(())
    }

    async fn user_ids(&self) -> Result<Vec<String>, AppError> {
        let users = self.users.read().await;
        let mut records: Vec<&User> = users.values().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(records.into_iter().map(|user| user.id.clone()).collect())
    }
}
