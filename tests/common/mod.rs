//! Common test utilities for E2E tests

#![allow(dead_code)]

use rustroost::data::{CallerId, Tweet, User, UserStore};
use rustroost::{AppState, config};
use tempfile::TempDir;

/// Test application instance backed by a throwaway SQLite file
pub struct TestApp {
    pub state: AppState,
    pub _temp_dir: TempDir,
}

impl TestApp {
    /// Create a new test application instance
    pub async fn new() -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let config = config::AppConfig {
            database: config::DatabaseConfig {
                path: db_path,
                max_connections: 2,
            },
            audit: config::AuditConfig {
                enabled: true,
                fail_on_inconsistency: true,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        Self {
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Register a user record the way the external registration service would
    pub async fn create_user(&self, id: &str) -> CallerId {
        self.state.db.insert_user(&User::new(id)).await.unwrap();
        CallerId::from(id)
    }

    /// Read a user record straight from the store
    pub async fn user(&self, id: &str) -> User {
        self.state
            .db
            .fetch_one(id)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("user {id} should exist"))
    }
}

/// Tweet texts in stored order
pub fn texts(tweets: &[Tweet]) -> Vec<&str> {
    tweets.iter().map(|tweet| tweet.text.as_str()).collect()
}
