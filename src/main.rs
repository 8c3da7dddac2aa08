//! One-off migration entry point: ensures tables, seeds default config entries,
//! and backfills slugs for every event that lacks one.

use dotenvy::dotenv;
use eventsite::{
    config::{database, settings},
    core::{config_store, slug},
    errors::Result,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the application configuration
    let app_config = settings::load_default_config()
        .inspect_err(|e| error!("Critical error loading application configuration: {}", e))?;

    // 4. Connect and make sure the tables exist
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Seed default config entries that are still missing
    config_store::seed_defaults(&db, &app_config.defaults)
        .await
        .inspect_err(|e| error!("Failed to seed default config entries: {}", e))?;

    // 6. Backfill slugs; per-record failures are reported, not fatal
    let report = slug::backfill_all(&db, app_config.slugs.max_attempts)
        .await
        .inspect_err(|e| error!("Failed to load events for backfill: {}", e))?;

    for failure in &report.failures {
        warn!(
            "Event {} still has no slug: {}",
            failure.event_id, failure.reason
        );
    }
    info!(
        "Backfill complete: {} events updated, {} failed.",
        report.updated,
        report.failures.len()
    );
    if !report.is_clean() {
        warn!("Re-run the backfill to retry the failed events.");
    }

    Ok(())
}
