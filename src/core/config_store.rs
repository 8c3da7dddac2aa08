//! Site config business logic - Typed key-value settings with last-write-wins upsert.
//!
//! Writes go through a single `INSERT ... ON CONFLICT(key) DO UPDATE` statement so that
//! concurrent writers of a brand-new key can never create two rows for it. There is no
//! cache: every read goes to the database, because the admin UI edits a value and
//! immediately reads it back.

use crate::{
    config::settings::DefaultEntryConfig,
    entities::{ConfigEntry, ConfigKind, config_entry},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::OnConflict};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

fn validate_entry(key: &str, value: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(Error::validation("Config key cannot be empty"));
    }
    if value.trim().is_empty() {
        return Err(Error::validation(format!(
            "Value for config key '{key}' cannot be empty"
        )));
    }
    Ok(())
}

fn new_entry(key: &str, value: &str, kind: ConfigKind) -> config_entry::ActiveModel {
    let now = chrono::Utc::now().naive_utc();
    config_entry::ActiveModel {
        key: Set(key.to_string()),
        value: Set(value.to_string()),
        kind: Set(kind),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
}

/// Inserts a new entry for `key`, or overwrites `value` and `kind` of the existing one.
///
/// Calling this twice with the same arguments leaves the same stored state. The
/// `created_at` timestamp of an existing entry is preserved.
///
/// # Errors
/// Returns `Error::Validation` if `key` or `value` is blank, and `Error::Persistence`
/// if the statement fails.
#[instrument(skip(db, value))]
pub async fn upsert_entry<C>(
    db: &C,
    key: &str,
    value: &str,
    kind: ConfigKind,
) -> Result<config_entry::Model>
where
    C: ConnectionTrait,
{
    validate_entry(key, value)?;

    let entry = ConfigEntry::insert(new_entry(key, value, kind))
        .on_conflict(
            OnConflict::column(config_entry::Column::Key)
                .update_columns([
                    config_entry::Column::Value,
                    config_entry::Column::Kind,
                    config_entry::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_with_returning(db)
        .await?;
    info!("Upserted config entry '{}' ({})", key, kind);
    Ok(entry)
}

/// Point lookup of a single entry. `None` means the key has not been configured yet.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_entry<C>(db: &C, key: &str) -> Result<Option<config_entry::Model>>
where
    C: ConnectionTrait,
{
    let entry = ConfigEntry::find()
        .filter(config_entry::Column::Key.eq(key))
        .one(db)
        .await?;
    debug!("Config entry for key '{}': {:?}", key, entry);
    Ok(entry)
}

/// Flattens every entry into a `key -> value` map. The `kind` is dropped; use
/// [`get_entry`] when it matters.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_values<C>(db: &C) -> Result<HashMap<String, String>>
where
    C: ConnectionTrait,
{
    let entries = ConfigEntry::find().all(db).await?;
    Ok(entries
        .into_iter()
        .map(|entry| (entry.key, entry.value))
        .collect())
}

/// Retrieves every entry with its kind, ordered alphabetically by key.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn list_entries<C>(db: &C) -> Result<Vec<config_entry::Model>>
where
    C: ConnectionTrait,
{
    ConfigEntry::find()
        .order_by_asc(config_entry::Column::Key)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates the given default entries where their key does not exist yet.
///
/// Existing values are never overwritten, so this is safe to run on every start-up.
/// Returns the number of entries that were inserted.
///
/// # Errors
/// Returns `Error::Validation` if any default has a blank key or value (nothing is
/// written in that case), or `Error::Persistence` if an insert fails.
#[instrument(skip_all, fields(count = defaults.len()))]
pub async fn seed_defaults<C>(db: &C, defaults: &[DefaultEntryConfig]) -> Result<u64>
where
    C: ConnectionTrait,
{
    for default in defaults {
        validate_entry(&default.key, &default.value)?;
    }

    let mut inserted = 0;
    for default in defaults {
        let rows = ConfigEntry::insert(new_entry(&default.key, &default.value, default.kind))
            .on_conflict(
                OnConflict::column(config_entry::Column::Key)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
        if rows > 0 {
            debug!("Seeded default config entry '{}'", default.key);
        }
        inserted += rows;
    }

    info!("Seeded {} default config entries.", inserted);
    Ok(inserted)
}
