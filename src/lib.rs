//! RustRoost - A minimal social graph and feed backend
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Tweets, follows, followers/following, feed               │
//! │  - Follow graph audit                                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - UserStore trait                                          │
//! │  - SQLite (sqlx)                                            │
//! │  - In-memory store                                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The caller's identity is resolved outside this crate and passed to
//! every operation as a [`data::CallerId`].
//!
//! # Modules
//!
//! - `service`: Business logic layer
//! - `data`: Record store trait and implementations
//! - `config`: Configuration management
//! - `metrics`: Prometheus instruments
//! - `error`: Error types

pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;

use std::sync::Arc;

/// Application state shared by the binary and embedding callers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Social graph & feed service over the database
    pub social: service::SocialService<data::Database>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database (runs migrations)
    /// 2. Publish the stored user count
    /// 3. Build the social service
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = data::Database::connect_with_pool_size(
            &config.database.path,
            config.database.max_connections,
        )
        .await?;
        let db = Arc::new(db);
        tracing::info!("Database connected");

        let users = db.count_users().await?;
        tracing::info!(users, "User records available");

        let social = service::SocialService::new(db.clone());

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            social,
        })
    }

    /// Run the follow graph audit against the database.
    pub async fn audit(&self) -> Result<service::AuditReport, error::AppError> {
        service::GraphAudit::new(self.db.clone()).run().await
    }
}
