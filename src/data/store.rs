//! Record store abstraction
//!
//! The service only needs single-record reads, multi-record reads and
//! whole-record overwrites. Both the SQLite database and the in-memory
//! store implement this trait.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use super::models::User;
use crate::error::AppError;

/// Key-addressable store of user records.
///
/// # Overwrite semantics
/// An overwrite replaces the stored record with `user` only when the
/// stored `version` equals `user.version`, and then increments it.
/// A stale version yields [`AppError::Conflict`]; an unknown id yields
/// [`AppError::NotFound`].
pub trait UserStore: Send + Sync {
    /// Fetch a single record.
    fn fetch_one(&self, id: &str) -> impl Future<Output = Result<Option<User>, AppError>> + Send;

    /// Fetch several records at once.
    ///
    /// Results follow the order of `ids`; unknown and repeated ids are skipped.
    fn fetch_many(
        &self,
        ids: &[String],
    ) -> impl Future<Output = Result<Vec<User>, AppError>> + Send;

    /// Replace one record, keyed by `user.id`.
    fn overwrite(&self, user: &User) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Replace several records atomically: either every record is
    /// written or none is.
    fn overwrite_all(&self, users: &[&User])
    -> impl Future<Output = Result<(), AppError>> + Send;

    /// Every stored id.
    fn user_ids(&self) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;
}

/// Arrange `users` in the order of `ids`, dropping repeats.
pub(crate) fn order_by_ids(ids: &[String], users: Vec<User>) -> Vec<User> {
    let mut by_id: HashMap<String, User> = users
        .into_iter()
        .map(|user| (user.id.clone(), user))
        .collect();
    let mut seen = HashSet::new();

    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .filter_map(|id| by_id.remove(id))
        .collect()
}

pub(crate) fn stale_version(id: &str, expected: i64) -> AppError {
    AppError::Conflict(format!(
        "user {id} was modified concurrently (expected version {expected})"
    ))
}
