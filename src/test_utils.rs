//! Shared test utilities.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test records with sensible defaults.

use crate::{
    config::settings::DefaultEntryConfig,
    entities::{ConfigKind, event},
    errors::Result,
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tracing_subscriber::EnvFilter;

/// Installs a test-writer subscriber once; later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

async fn insert_event(
    db: &DatabaseConnection,
    title: &str,
    slug: Option<&str>,
) -> Result<event::Model> {
    let now = chrono::Utc::now().naive_utc();
    let model = event::ActiveModel {
        title: Set(title.to_string()),
        slug: Set(slug.map(str::to_string)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Inserts an event the way legacy records look: no slug at all.
pub async fn insert_legacy_event(db: &DatabaseConnection, title: &str) -> Result<event::Model> {
    insert_event(db, title, None).await
}

/// Inserts an event with a fixed slug, bypassing normalization.
pub async fn insert_event_with_slug(
    db: &DatabaseConnection,
    title: &str,
    slug: &str,
) -> Result<event::Model> {
    insert_event(db, title, Some(slug)).await
}

/// Builds an event model that is not stored anywhere.
pub fn event_model(id: i64, title: &str, slug: Option<&str>) -> event::Model {
    let now = chrono::Utc::now().naive_utc();
    event::Model {
        id,
        title: title.to_string(),
        slug: slug.map(str::to_string),
        created_at: now,
        updated_at: now,
    }
}

/// Builds a seed entry as it would come out of config.toml.
pub fn default_entry(key: &str, value: &str, kind: ConfigKind) -> DefaultEntryConfig {
    DefaultEntryConfig {
        key: key.to_string(),
        value: value.to_string(),
        kind,
    }
}
