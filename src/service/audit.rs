//! Follow graph audit
//!
//! Checks that every follow edge is recorded on both sides. The audit
//! only reports; it never rewrites records.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::data::{User, UserStore};
use crate::error::AppError;

/// Number of records fetched per `fetch_many` call
const AUDIT_BATCH_SIZE: usize = 200;

/// Findings of one audit pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub users_scanned: usize,
    /// `(follower, followee)`: follower lists followee, but followee
    /// does not list follower among its followers
    pub missing_followers: Vec<(String, String)>,
    /// `(followee, follower)`: followee lists follower, but follower
    /// does not list followee in its following
    pub missing_following: Vec<(String, String)>,
    /// `(user, referenced)`: a follow entry points at no stored user
    pub dangling: Vec<(String, String)>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_followers.is_empty()
            && self.missing_following.is_empty()
            && self.dangling.is_empty()
    }

    pub fn issue_count(&self) -> usize {
        self.missing_followers.len() + self.missing_following.len() + self.dangling.len()
    }
}

/// Follow graph auditor
pub struct GraphAudit<S> {
    store: Arc<S>,
}

impl<S: UserStore> GraphAudit<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Scan every user and collect one-sided follow edges.
    pub async fn run(&self) -> Result<AuditReport, AppError> {
        let ids = self.store.user_ids().await?;

        let mut users: HashMap<String, User> = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(AUDIT_BATCH_SIZE) {
            for user in self.store.fetch_many(chunk).await? {
                users.insert(user.id.clone(), user);
            }
        }

        let mut report = AuditReport {
            users_scanned: users.len(),
            ..AuditReport::default()
        };

        for id in &ids {
            let Some(user) = users.get(id) else {
                continue;
            };

            for followee in &user.following {
                match users.get(&followee.user_id) {
                    None => report
                        .dangling
                        .push((user.id.clone(), followee.user_id.clone())),
                    Some(target) if !target.is_followed_by(&user.id) => report
                        .missing_followers
                        .push((user.id.clone(), followee.user_id.clone())),
                    Some(_) => {}
                }
            }

            for follower in &user.followers {
                match users.get(&follower.user_id) {
                    None => report
                        .dangling
                        .push((user.id.clone(), follower.user_id.clone())),
                    Some(source) if !source.is_following(&user.id) => report
                        .missing_following
                        .push((user.id.clone(), follower.user_id.clone())),
                    Some(_) => {}
                }
            }
        }

        if report.is_consistent() {
            tracing::info!(users = report.users_scanned, "Follow graph is consistent");
        } else {
            tracing::warn!(
                users = report.users_scanned,
                missing_followers = report.missing_followers.len(),
                missing_following = report.missing_following.len(),
                dangling = report.dangling.len(),
                "Follow graph has one-sided edges"
            );
        }

        Ok(report)
    }
}
