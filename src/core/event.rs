//! Event business logic - The slug-relevant slice of event records.
//!
//! Events created through [`create_event`] get their slug at creation time. Legacy
//! records without one are found by [`get_events_missing_slug`] and handled by the
//! slug backfill.

use crate::{
    core::slug,
    entities::{Event, event},
    errors::{Error, Result},
};
use sea_orm::{Condition, QueryOrder, Set, prelude::*};
use tracing::instrument;

/// Finds an event by its unique ID.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_event_by_id<C>(db: &C, event_id: i64) -> Result<Option<event::Model>>
where
    C: ConnectionTrait,
{
    Event::find_by_id(event_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds the event holding `slug`, used to resolve public event URLs.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_event_by_slug<C>(db: &C, slug: &str) -> Result<Option<event::Model>>
where
    C: ConnectionTrait,
{
    Event::find()
        .filter(event::Column::Slug.eq(slug))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves every event whose slug is absent or empty, ordered by ID.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_events_missing_slug<C>(db: &C) -> Result<Vec<event::Model>>
where
    C: ConnectionTrait,
{
    Event::find()
        .filter(
            Condition::any()
                .add(event::Column::Slug.is_null())
                .add(event::Column::Slug.eq("")),
        )
        .order_by_asc(event::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates a new event and assigns its slug.
///
/// The title is trimmed. If every slug attempt is rejected the event still exists
/// without a slug and the error is returned; the backfill will pick it up.
///
/// # Errors
/// Returns an error if:
/// - The title is empty or whitespace-only
/// - The insert fails
/// - Slug assignment fails after `max_slug_attempts` attempts
#[instrument(skip(db))]
pub async fn create_event<C>(db: &C, title: &str, max_slug_attempts: u32) -> Result<event::Model>
where
    C: ConnectionTrait,
{
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::validation("Event title cannot be empty"));
    }

    let now = chrono::Utc::now().naive_utc();
    let created = event::ActiveModel {
        title: Set(title.to_string()),
        slug: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    slug::assign_with_retry(db, &created, max_slug_attempts).await?;

    get_event_by_id(db, created.id)
        .await?
        .ok_or(Error::EventNotFound { id: created.id })
}
