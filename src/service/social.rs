//! Social graph & feed service
//!
//! Tweets, follow relationships and feeds for a single caller.
//! Every operation is a short, strictly sequential chain of store calls.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::data::{CallerId, Tweet, User, UserRef, UserStore};
use crate::error::AppError;
use crate::metrics::observe_operation;

/// Result of a mutating operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// The record(s) were written
    Updated,
    /// The caller already follows the target; nothing was written
    AlreadyFollowing,
    /// The caller has no user record; nothing was written
    NoUserFound,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::AlreadyFollowing => "already-following",
            Self::NoUserFound => "no-user-found",
        }
    }
}

/// Resolved users on one side of the follow relation
///
/// `Empty` means the caller has no entries on that side (or no record
/// at all). It serializes as `{}` so clients can tell it apart from a
/// list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connections {
    Empty,
    Users(Vec<User>),
}

impl Connections {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn users(&self) -> &[User] {
        match self {
            Self::Empty => &[],
            Self::Users(users) => users,
        }
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.users().iter().any(|user| user.id == user_id)
    }
}

impl Serialize for Connections {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Empty => serializer.serialize_map(Some(0))?.end(),
            Self::Users(users) => users.serialize(serializer),
        }
    }
}

/// Tweets visible to a caller, grouped by author
///
/// The caller's own tweets come first, then each followed user's tweets
/// in following-list order. Authors without tweets are left out.
pub type Feed = Vec<Vec<Tweet>>;

/// Which side of the follow relation to resolve
#[derive(Debug, Clone, Copy)]
enum Side {
    Followers,
    Following,
}

/// Social graph & feed service
pub struct SocialService<S> {
    store: Arc<S>,
}

impl<S> Clone for SocialService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: UserStore> SocialService<S> {
    /// Create new social service
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Underlying record store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Append a tweet to the caller's timeline
    ///
    /// # Errors
    /// `NotFound` if the caller has no user record; store errors
    /// (including `Conflict` on a concurrent write) are propagated.
    pub async fn post_update(&self, caller: &CallerId, text: &str) -> Result<Outcome, AppError> {
        const OPERATION: &str = "post_update";
        let started = Instant::now();

        let result = async {
            let mut user = self
                .store
                .fetch_one(caller.as_str())
                .await?
                .ok_or(AppError::NotFound)?;

            user.tweets.push(Tweet {
                text: text.to_string(),
                posted_at: Utc::now(),
            });
            self.store.overwrite(&user).await?;

            tracing::debug!(
                user_id = %caller,
                tweets = user.tweets.len(),
                "Tweet posted"
            );
            Ok::<_, AppError>(Outcome::Updated)
        }
        .await;

        finish(OPERATION, started, result, |outcome| outcome.as_str())
    }

    /// Make the caller follow `target_id`
    ///
    /// Both halves of the relation are persisted in one atomic
    /// `overwrite_all`.
    ///
    /// # Returns
    /// - `NoUserFound` if the caller has no record
    /// - `AlreadyFollowing` if the caller already follows the target
    /// - `Updated` otherwise
    ///
    /// # Errors
    /// `NotFound` if the target has no record (nothing is written).
    pub async fn follow_user(
        &self,
        caller: &CallerId,
        target_id: &str,
    ) -> Result<Outcome, AppError> {
        const OPERATION: &str = "follow_user";
        let started = Instant::now();

        let result = async {
            let Some(mut user) = self.store.fetch_one(caller.as_str()).await? else {
                return Ok(Outcome::NoUserFound);
            };

            if user.is_following(target_id) {
                return Ok(Outcome::AlreadyFollowing);
            }

            user.following.push(UserRef::new(target_id));

            if user.id == target_id {
                user.followers.push(UserRef::new(caller.as_str()));
                self.store.overwrite(&user).await?;
            } else {
                let mut target = self
                    .store
                    .fetch_one(target_id)
                    .await?
                    .ok_or(AppError::NotFound)?;
                target.followers.push(UserRef::new(caller.as_str()));
                self.store.overwrite_all(&[&user, &target]).await?;
            }

            tracing::info!(
                user_id = %caller,
                target_id = %target_id,
                "Follow relationship created"
            );
            Ok::<_, AppError>(Outcome::Updated)
        }
        .await;

        finish(OPERATION, started, result, |outcome| outcome.as_str())
    }

    /// Users following the caller
    pub async fn list_followers(&self, caller: &CallerId) -> Result<Connections, AppError> {
        self.list_connections(caller, Side::Followers).await
    }

    /// Users the caller follows
    pub async fn list_following(&self, caller: &CallerId) -> Result<Connections, AppError> {
        self.list_connections(caller, Side::Following).await
    }

    /// Tweets from the caller and everyone the caller follows
    ///
    /// Tweets are grouped by author, not merged or re-sorted.
    ///
    /// # Errors
    /// `NotFound` if the caller has no user record.
    pub async fn list_feed(&self, caller: &CallerId) -> Result<Feed, AppError> {
        const OPERATION: &str = "list_feed";
        let started = Instant::now();

        let result = async {
            let user = self
                .store
                .fetch_one(caller.as_str())
                .await?
                .ok_or(AppError::NotFound)?;
            let following = self.resolve(Some(&user), Side::Following).await?;

            let mut feed = Feed::new();
            if !user.tweets.is_empty() {
                feed.push(user.tweets);
            }
            if let Connections::Users(followed) = following {
                feed.extend(
                    followed
                        .into_iter()
                        .filter(|followed| !followed.tweets.is_empty())
                        .map(|followed| followed.tweets),
                );
            }
            Ok::<_, AppError>(feed)
        }
        .await;

        finish(OPERATION, started, result, |feed| {
            if feed.is_empty() { "empty" } else { "ok" }
        })
    }

    async fn list_connections(
        &self,
        caller: &CallerId,
        side: Side,
    ) -> Result<Connections, AppError> {
        let operation = match side {
            Side::Followers => "list_followers",
            Side::Following => "list_following",
        };
        let started = Instant::now();

        let result = async {
            let user = self.store.fetch_one(caller.as_str()).await?;
            self.resolve(user.as_ref(), side).await
        }
        .await;

        finish(operation, started, result, |connections| {
            if connections.is_empty() { "empty" } else { "ok" }
        })
    }

    /// Resolve one side of `user`'s follow relation with a single multi-fetch.
    async fn resolve(&self, user: Option<&User>, side: Side) -> Result<Connections, AppError> {
        let ids = match (user, side) {
            (Some(user), Side::Followers) => user.follower_ids(),
            (Some(user), Side::Following) => user.following_ids(),
            (None, _) => return Ok(Connections::Empty),
        };
        if ids.is_empty() {
            return Ok(Connections::Empty);
        }

        let users = self.store.fetch_many(&ids).await?;
        Ok(Connections::Users(users))
    }
}

/// Record metrics for a finished operation and pass its result through.
fn finish<T>(
    operation: &str,
    started: Instant,
    result: Result<T, AppError>,
    outcome: impl FnOnce(&T) -> &'static str,
) -> Result<T, AppError> {
    match &result {
        Ok(value) => observe_operation(operation, outcome(value), started.elapsed()),
        Err(error) => {
            error.record(operation);
            observe_operation(operation, "error", started.elapsed());
            tracing::warn!(operation, error = %error, "Social operation failed");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store wrapper that counts write calls
    struct CountingStore {
        inner: MemoryStore,
        writes: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                writes: AtomicUsize::new(0),
            }
        }

        fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    impl UserStore for CountingStore {
        async fn fetch_one(&self, id: &str) -> Result<Option<User>, AppError> {
            self.inner.fetch_one(id).await
        }

        async fn fetch_many(&self, ids: &[String]) -> Result<Vec<User>, AppError> {
            self.inner.fetch_many(ids).await
        }

        async fn overwrite(&self, user: &User) -> Result<(), AppError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.overwrite(user).await
        }

        async fn overwrite_all(&self, users: &[&User]) -> Result<(), AppError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.overwrite_all(users).await
        }

        async fn user_ids(&self) -> Result<Vec<String>, AppError> {
            self.inner.user_ids().await
        }
    }

    async fn service_with(ids: &[&str]) -> SocialService<CountingStore> {
        let store = CountingStore::new();
        for id in ids {
            store.inner.insert_user(User::new(*id)).await.unwrap();
        }
        SocialService::new(Arc::new(store))
    }

    fn texts(tweets: &[Tweet]) -> Vec<&str> {
        tweets.iter().map(|tweet| tweet.text.as_str()).collect()
    }

    #[tokio::test]
    async fn post_update_appends_in_order() {
        let service = service_with(&["alice"]).await;
        let alice = CallerId::from("alice");

        assert_eq!(
            service.post_update(&alice, "hello").await.unwrap(),
            Outcome::Updated
        );
        service.post_update(&alice, "again").await.unwrap();

        let user = service.store().fetch_one("alice").await.unwrap().unwrap();
        assert_eq!(texts(&user.tweets), vec!["hello", "again"]);
        assert!(user.tweets[0].posted_at <= user.tweets[1].posted_at);
    }

    #[tokio::test]
    async fn post_update_for_unknown_user_is_not_found() {
        let service = service_with(&[]).await;

        let error = service
            .post_update(&CallerId::from("ghost"), "hello")
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::NotFound));
        assert_eq!(service.store().writes(), 0);
    }

    #[tokio::test]
    async fn follow_twice_writes_once() {
        let service = service_with(&["alice", "bob"]).await;
        let alice = CallerId::from("alice");

        assert_eq!(
            service.follow_user(&alice, "bob").await.unwrap(),
            Outcome::Updated
        );
        assert_eq!(service.store().writes(), 1);

        assert_eq!(
            service.follow_user(&alice, "bob").await.unwrap(),
            Outcome::AlreadyFollowing
        );
        assert_eq!(service.store().writes(), 1);
    }

    #[tokio::test]
    async fn follow_from_unknown_user_leaves_target_untouched() {
        let service = service_with(&["bob"]).await;

        let outcome = service
            .follow_user(&CallerId::from("ghost"), "bob")
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::NoUserFound);
        assert_eq!(service.store().writes(), 0);

        let bob = service.store().fetch_one("bob").await.unwrap().unwrap();
        assert!(bob.followers.is_empty());
        assert_eq!(bob.version, 0);
    }

    #[tokio::test]
    async fn follow_unknown_target_writes_nothing() {
        let service = service_with(&["alice"]).await;

        let error = service
            .follow_user(&CallerId::from("alice"), "ghost")
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::NotFound));
        assert_eq!(service.store().writes(), 0);

        let alice = service.store().fetch_one("alice").await.unwrap().unwrap();
        assert!(alice.following.is_empty());
    }

    #[tokio::test]
    async fn self_follow_updates_both_lists_of_one_record() {
        let service = service_with(&["alice"]).await;
        let alice = CallerId::from("alice");

        assert_eq!(
            service.follow_user(&alice, "alice").await.unwrap(),
            Outcome::Updated
        );

        let user = service.store().fetch_one("alice").await.unwrap().unwrap();
        assert!(user.is_following("alice"));
        assert!(user.is_followed_by("alice"));
        assert_eq!(user.version, 1);
    }

    #[tokio::test]
    async fn follow_is_visible_from_both_sides() {
        let service = service_with(&["alice", "bob"]).await;
        let alice = CallerId::from("alice");
        let bob = CallerId::from("bob");

        service.follow_user(&alice, "bob").await.unwrap();

        assert!(service.list_following(&alice).await.unwrap().contains("bob"));
        assert!(service.list_followers(&bob).await.unwrap().contains("alice"));
        assert!(service.list_followers(&alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_for_unknown_user_is_empty_marker() {
        let service = service_with(&[]).await;
        let ghost = CallerId::from("ghost");

        assert_eq!(
            service.list_followers(&ghost).await.unwrap(),
            Connections::Empty
        );
        assert_eq!(
            service.list_following(&ghost).await.unwrap(),
            Connections::Empty
        );
    }

    #[tokio::test]
    async fn feed_groups_tweets_by_author() {
        let service = service_with(&["alice", "bob", "carol", "dave"]).await;
        let alice = CallerId::from("alice");

        service.post_update(&alice, "hi").await.unwrap();
        service
            .post_update(&CallerId::from("bob"), "yo")
            .await
            .unwrap();
        service
            .post_update(&CallerId::from("dave"), "hey")
            .await
            .unwrap();
        service
            .post_update(&CallerId::from("dave"), "there")
            .await
            .unwrap();

        service.follow_user(&alice, "dave").await.unwrap();
        service.follow_user(&alice, "carol").await.unwrap();
        service.follow_user(&alice, "bob").await.unwrap();

        let feed = service.list_feed(&alice).await.unwrap();
        let grouped: Vec<Vec<&str>> = feed.iter().map(|tweets| texts(tweets)).collect();
        assert_eq!(
            grouped,
            vec![vec!["hi"], vec!["hey", "there"], vec!["yo"]]
        );
    }

    #[tokio::test]
    async fn feed_without_tweets_or_follows_is_empty() {
        let service = service_with(&["alice"]).await;

        let feed = service.list_feed(&CallerId::from("alice")).await.unwrap();
        assert!(feed.is_empty());
    }

    #[tokio::test]
    async fn feed_for_unknown_user_is_not_found() {
        let service = service_with(&[]).await;

        let error = service
            .list_feed(&CallerId::from("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::NotFound));
    }

    #[test]
    fn outcome_serializes_as_kebab_case() {
        assert_eq!(
            serde_json::to_value(Outcome::AlreadyFollowing).unwrap(),
            serde_json::json!("already-following")
        );
        assert_eq!(Outcome::NoUserFound.as_str(), "no-user-found");
        assert_eq!(Outcome::Updated.as_str(), "updated");
    }

    #[test]
    fn empty_connections_serialize_as_empty_object() {
        assert_eq!(
            serde_json::to_value(Connections::Empty).unwrap(),
            serde_json::json!({})
        );
        let users = Connections::Users(vec![User::new("bob")]);
        let json = serde_json::to_value(&users).unwrap();
        assert_eq!(json[0]["id"], "bob");
    }
}
