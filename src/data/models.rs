//! Data models
//!
//! Rust structs representing stored records.
//! Locally generated IDs are ULIDs and timestamps use chrono.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity of the user on whose behalf an operation runs.
///
/// Resolved by an external identity provider and passed explicitly
/// into every service call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(String);

impl CallerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CallerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CallerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for CallerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// User
// =============================================================================

/// A short text update owned by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tweet {
    pub text: String,
    pub posted_at: DateTime<Utc>,
}

/// Reference to another user in a follow list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub user_id: String,
}

impl UserRef {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// A user record
///
/// `following` and `followers` are the two halves of the follow
/// relation: A.following holds B exactly when B.followers holds A.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Append-only, oldest first
    #[serde(default)]
    pub tweets: Vec<Tweet>,
    #[serde(default)]
    pub following: Vec<UserRef>,
    #[serde(default)]
    pub followers: Vec<UserRef>,
    /// Bumped by the store on every successful overwrite
    #[serde(default)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Blank record with the given id
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            tweets: Vec::new(),
            following: Vec::new(),
            followers: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Blank record with a freshly generated ULID
    pub fn generate() -> Self {
        Self::new(EntityId::new().0)
    }

    pub fn is_following(&self, user_id: &str) -> bool {
        self.following.iter().any(|entry| entry.user_id == user_id)
    }

    pub fn is_followed_by(&self, user_id: &str) -> bool {
        self.followers.iter().any(|entry| entry.user_id == user_id)
    }

    pub fn following_ids(&self) -> Vec<String> {
        self.following
            .iter()
            .map(|entry| entry.user_id.clone())
            .collect()
    }

    pub fn follower_ids(&self) -> Vec<String> {
        self.followers
            .iter()
            .map(|entry| entry.user_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_serializes_with_snake_case_fields() {
        let mut user = User::new("alice");
        user.tweets.push(Tweet {
            text: "hi".to_string(),
            posted_at: Utc::now(),
        });
        user.following.push(UserRef::new("bob"));

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["id"], "alice");
        assert_eq!(json["tweets"][0]["text"], "hi");
        assert!(json["tweets"][0]["posted_at"].is_string());
        assert_eq!(json["following"][0]["user_id"], "bob");
        assert_eq!(json["followers"], serde_json::json!([]));
    }

    #[test]
    fn membership_compares_ids_as_strings() {
        let mut user = User::new("alice");
        user.following.push(UserRef::new("42"));
        user.followers.push(UserRef::new("7"));

        assert!(user.is_following("42"));
        assert!(!user.is_following("042"));
        assert!(user.is_followed_by("7"));
        assert_eq!(user.following_ids(), vec!["42".to_string()]);
    }

    #[test]
    fn generated_ids_are_ulids() {
        let user = User::generate();
        assert_eq!(user.id.len(), 26);
        assert_eq!(user.version, 0);
    }
}
