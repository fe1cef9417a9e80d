//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
    /// Maximum pooled connections (default: 5)
    pub max_connections: u32,
}

/// Follow graph audit configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Run the audit at startup
    pub enabled: bool,
    /// Exit with an error when the audit finds one-sided edges
    pub fail_on_inconsistency: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is not set
    pub fn filter_directive(&self) -> String {
        format!("rustroost={},sqlx=warn", self.level.to_ascii_lowercase())
    }

    /// Whether log lines are emitted as JSON
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (RUSTROOST__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("database.path", "data/rustroost.db")?
            .set_default("database.max_connections", 5)?
            .set_default("audit.enabled", true)?
            .set_default("audit.fail_on_inconsistency", false)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (RUSTROOST__*)
            .add_source(
                Environment::with_prefix("RUSTROOST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const LOG_FORMATS: [&str; 2] = ["pretty", "json"];
        const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

        if self.database.max_connections == 0 {
            return Err(crate::error::AppError::Config(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        if !LOG_FORMATS
            .iter()
            .any(|format| self.logging.format.eq_ignore_ascii_case(format))
        {
            return Err(crate::error::AppError::Config(format!(
                "logging.format must be one of {}, got {:?}",
                LOG_FORMATS.join(", "),
                self.logging.format
            )));
        }

        if !LOG_LEVELS
            .iter()
            .any(|level| self.logging.level.eq_ignore_ascii_case(level))
        {
            return Err(crate::error::AppError::Config(format!(
                "logging.level must be one of {}, got {:?}",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }

        Ok(())
    }
}
