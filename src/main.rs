//! RustRoost binary entry point

use rustroost::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging from the `logging` section
/// 3. Initialize metrics
/// 4. Initialize AppState (connects and migrates the database)
/// 5. Audit the follow graph
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging (RUST_LOG overrides logging.level)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.filter_directive().into());

    if config.logging.is_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting RustRoost...");
    tracing::info!(
        database = %config.database.path.display(),
        "Configuration loaded"
    );

    // 3. Initialize metrics
    rustroost::metrics::init_metrics();

    // 4. Initialize application state
    let state = AppState::new(config).await?;

    // 5. Audit the follow graph
    if state.config.audit.enabled {
        let report = state.audit().await?;
        for (follower, followee) in &report.missing_followers {
            tracing::warn!(%follower, %followee, "Followee does not list follower");
        }
        for (followee, follower) in &report.missing_following {
            tracing::warn!(%followee, %follower, "Follower does not list followee");
        }
        for (user, referenced) in &report.dangling {
            tracing::warn!(%user, %referenced, "Follow entry points at a missing user");
        }

        if !report.is_consistent() && state.config.audit.fail_on_inconsistency {
            return Err(format!(
                "follow graph audit found {} inconsistent edge(s)",
                report.issue_count()
            )
            .into());
        }
    }

    match rustroost::metrics::gather_metrics() {
        Ok(text) => tracing::debug!(metrics = %text, "Metrics snapshot"),
        Err(error) => tracing::error!(%error, "Failed to encode metrics"),
    }

    tracing::info!("RustRoost finished");
    Ok(())
}
