//! SQLite database operations
//!
//! All persistent access to user records goes through this module.
//! The three per-user sequences are stored as JSON text columns and
//! rewritten wholesale on every overwrite.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, QueryBuilder, Sqlite, SqliteConnection};
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use super::models::*;
use super::store::{UserStore, order_by_ids, stale_version};
use crate::error::AppError;
use crate::metrics::observe_db_query;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Ids bound per `IN (...)` query in `fetch_many`
const FETCH_BATCH_SIZE: usize = 500;

/// Row layout of the `users` table
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    tweets: String,
    following: String,
    followers: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            tweets: serde_json::from_str(&row.tweets)?,
            following: serde_json::from_str(&row.following)?,
            followers: serde_json::from_str(&row.followers)?,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Encoded JSON columns for one user
struct EncodedLists {
    tweets: String,
    following: String,
    followers: String,
}

impl EncodedLists {
    fn encode(user: &User) -> Result<Self, AppError> {
        Ok(Self {
            tweets: serde_json::to_string(&user.tweets)?,
            following: serde_json::to_string(&user.following)?,
            followers: serde_json::to_string(&user.followers)?,
        })
    }
}

/// Compare-and-swap update of one row on an existing connection.
async fn update_user_row(conn: &mut SqliteConnection, user: &User) -> Result<(), AppError> {
    let started = Instant::now();
    let encoded = EncodedLists::encode(user)?;

    let result = sqlx::query(
        r#"
        UPDATE users
        SET tweets = ?, following = ?, followers = ?, version = version + 1, updated_at = ?
        WHERE id = ? AND version = ?
        "#,
    )
    .bind(&encoded.tweets)
    .bind(&encoded.following)
    .bind(&encoded.followers)
    .bind(Utc::now())
    .bind(&user.id)
    .bind(user.version)
    .execute(&mut *conn)
    .await?;
    observe_db_query("update", "users", started.elapsed());

    if result.rows_affected() > 0 {
        return Ok(());
    }

    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ?")
        .bind(&user.id)
        .fetch_one(&mut *conn)
        .await?;
    if exists > 0 {
        Err(stale_version(&user.id, user.version))
    } else {
        Err(AppError::NotFound)
    }
}

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        Self::connect_with_pool_size(path, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Connect with an explicit connection pool size.
    pub async fn connect_with_pool_size(
        path: &Path,
        max_connections: u32,
    ) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let options = SqliteConnectOptions::from_str(&connection_string)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a new user record
    ///
    /// Registration is owned by an external service; this exists for
    /// seeding and tests.
    ///
    /// # Errors
    /// `Validation` if a user with the same id already exists
    pub async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let started = Instant::now();
        let encoded = EncodedLists::encode(user)?;

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, tweets, following, followers, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&encoded.tweets)
        .bind(&encoded.following)
        .bind(&encoded.followers)
        .bind(user.version)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await;
        observe_db_query("insert", "users", started.elapsed());

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(error)) if error.is_unique_violation() => Err(
                AppError::Validation(format!("user {} already exists", user.id)),
            ),
            Err(error) => Err(error.into()),
        }
    }

    /// Count stored users and publish the gauge.
    pub async fn count_users(&self) -> Result<i64, AppError> {
        let started = Instant::now();
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        observe_db_query("count", "users", started.elapsed());

        crate::metrics::USERS_TOTAL.set(count);
        Ok(count)
    }
}

impl UserStore for Database {
    async fn fetch_one(&self, id: &str) -> Result<Option<User>, AppError> {
        let started = Instant::now();
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        observe_db_query("select", "users", started.elapsed());

        row.map(User::try_from).transpose()
    }

    async fn fetch_many(&self, ids: &[String]) -> Result<Vec<User>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut users = Vec::with_capacity(ids.len());
        // One bind variable per id; SQLite caps the number per statement.
        for chunk in ids.chunks(FETCH_BATCH_SIZE) {
            let started = Instant::now();
            let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM users WHERE id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(id.clone());
            }
            separated.push_unseparated(")");

            let rows = builder
                .build_query_as::<UserRow>()
                .fetch_all(&self.pool)
                .await?;
            observe_db_query("select_many", "users", started.elapsed());

            for row in rows {
                users.push(User::try_from(row)?);
            }
        }

        Ok(order_by_ids(ids, users))
    }

    async fn overwrite(&self, user: &User) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        update_user_row(&mut *conn, user).await
    }

    async fn overwrite_all(&self, users: &[&User]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        // Dropping the transaction on error rolls it back.
        for user in users {
            update_user_row(&mut *tx, user).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn user_ids(&self) -> Result<Vec<String>, AppError> {
        let started = Instant::now();
        let ids = sqlx::query_scalar::<_, String>("SELECT id FROM users ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;
        observe_db_query("select_ids", "users", started.elapsed());

        Ok(ids)
    }
}
