//! Slug business logic - Derives a URL-safe, unique identifier for every event.
//!
//! A slug is derived from the event title by [`normalize_title`], then made unique by
//! appending `-1`, `-2`, ... until no *other* event holds the candidate. That lookup only
//! keeps retries rare. Two processes can still pick the same candidate at the same time,
//! so the write itself is checked by the unique index on `events.slug`: a rejected write
//! surfaces as [`Error::DuplicateSlug`] and the caller re-invokes [`assign_if_missing`],
//! which recomputes against the new state.

use crate::{
    entities::{Event, event},
    errors::{Error, Result},
};
use sea_orm::{Condition, SqlErr, prelude::*, sea_query::Expr};
use tracing::{debug, error, info, instrument, warn};

/// Base slug used when nothing of the title survives normalization.
pub const FALLBACK_SLUG: &str = "event";

/// Outcome of a slug assignment for a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlugAssignment {
    /// The event already had a slug; nothing was written
    Existing(String),
    /// A new slug was persisted by this call
    Assigned(String),
}

impl SlugAssignment {
    /// The slug the event ends up with.
    #[must_use]
    pub fn slug(&self) -> &str {
        match self {
            Self::Existing(slug) | Self::Assigned(slug) => slug,
        }
    }

    /// Whether this call wrote to the database.
    #[must_use]
    pub const fn was_written(&self) -> bool {
        matches!(self, Self::Assigned(_))
    }

    fn into_slug(self) -> String {
        match self {
            Self::Existing(slug) | Self::Assigned(slug) => slug,
        }
    }
}

/// A record the backfill could not assign a slug to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillFailure {
    /// Primary key of the event
    pub event_id: i64,
    /// Rendered error
    pub reason: String,
}

/// Summary of a backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Events that received a slug during this run
    pub updated: usize,
    /// Events that already had a slug (including ones assigned concurrently)
    pub skipped: usize,
    /// Events that failed; the rest of the run continued past them
    pub failures: Vec<BackfillFailure>,
}

impl BackfillReport {
    /// Ids of the events that failed, in processing order.
    #[must_use]
    pub fn failed_ids(&self) -> Vec<i64> {
        self.failures.iter().map(|f| f.event_id).collect()
    }

    /// True when no record failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Turns a title into a base slug.
///
/// Lower-cases the title, drops everything except ASCII letters, digits, whitespace and
/// hyphens, turns each run of whitespace and hyphens into a single hyphen, and trims
/// hyphens from both ends. Falls back to [`FALLBACK_SLUG`] when nothing is left.
///
/// ```
/// use eventsite::core::slug::normalize_title;
///
/// assert_eq!(normalize_title("Hello, World!!!"), "hello-world");
/// assert_eq!(normalize_title("!!!"), "event");
/// ```
#[must_use]
pub fn normalize_title(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_separator = false;

    for ch in title.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(ch);
        } else if ch.is_whitespace() || ch == '-' {
            pending_separator = true;
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

async fn slug_taken_by_other<C>(db: &C, candidate: &str, event_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let holder = Event::find()
        .filter(event::Column::Slug.eq(candidate))
        .filter(event::Column::Id.ne(event_id))
        .one(db)
        .await?;
    Ok(holder.is_some())
}

/// Finds the first of `base`, `base-1`, `base-2`, ... not held by an event other than
/// `event_id`.
///
/// The answer is only valid at the time of the reads; [`persist_slug`] is what enforces
/// uniqueness.
///
/// # Errors
/// Returns an error if a lookup fails.
pub async fn resolve_unique_slug<C>(db: &C, base: &str, event_id: i64) -> Result<String>
where
    C: ConnectionTrait,
{
    let mut candidate = base.to_string();
    let mut counter: u64 = 1;

    while slug_taken_by_other(db, &candidate, event_id).await? {
        debug!("Slug '{}' is taken, trying next suffix", candidate);
        candidate = format!("{base}-{counter}");
        counter += 1;
    }

    Ok(candidate)
}

fn classify_write_error(err: DbErr, slug: &str) -> Error {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            warn!("Unique index rejected slug '{}': {}", slug, detail);
            Error::DuplicateSlug {
                slug: slug.to_string(),
            }
        }
        _ => Error::Persistence(err),
    }
}

/// Writes `slug` to the event, but only while the event still has no slug.
///
/// If another writer assigned this event first, that slug is returned as
/// [`SlugAssignment::Existing`] instead of being overwritten.
///
/// # Errors
/// - `Error::DuplicateSlug` if another event holds `slug` (unique index violation)
/// - `Error::EventNotFound` if the event no longer exists
/// - `Error::Persistence` for any other database failure
#[instrument(skip(db))]
pub async fn persist_slug<C>(db: &C, event_id: i64, slug: &str) -> Result<SlugAssignment>
where
    C: ConnectionTrait,
{
    let result = Event::update_many()
        .col_expr(event::Column::Slug, Expr::value(slug))
        .col_expr(
            event::Column::UpdatedAt,
            Expr::value(chrono::Utc::now().naive_utc()),
        )
        .filter(event::Column::Id.eq(event_id))
        .filter(
            Condition::any()
                .add(event::Column::Slug.is_null())
                .add(event::Column::Slug.eq("")),
        )
        .exec(db)
        .await
        .map_err(|e| classify_write_error(e, slug))?;

    if result.rows_affected > 0 {
        info!("Assigned slug '{}' to event {}", slug, event_id);
        return Ok(SlugAssignment::Assigned(slug.to_string()));
    }

    // Nothing matched: the event is gone, or somebody else slugged it first
    let current = Event::find_by_id(event_id)
        .one(db)
        .await?
        .ok_or(Error::EventNotFound { id: event_id })?;
    current
        .assigned_slug()
        .map(|existing| SlugAssignment::Existing(existing.to_string()))
        .ok_or(Error::Persistence(DbErr::RecordNotUpdated))
}

async fn assign<C>(db: &C, event: &event::Model) -> Result<SlugAssignment>
where
    C: ConnectionTrait,
{
    if let Some(existing) = event.assigned_slug() {
        return Ok(SlugAssignment::Existing(existing.to_string()));
    }

    let base = normalize_title(&event.title);
    let candidate = resolve_unique_slug(db, &base, event.id).await?;
    persist_slug(db, event.id, &candidate).await
}

/// Returns the event's slug, deriving and persisting one first if it has none.
///
/// An event that already has a non-empty slug is returned as-is without touching the
/// database, so this is safe to call repeatedly.
///
/// # Errors
/// Returns `Error::DuplicateSlug` if a concurrent writer claimed the chosen slug first.
/// Re-invoking is safe and will pick the next free candidate.
#[instrument(skip(db, event), fields(event_id = event.id))]
pub async fn assign_if_missing<C>(db: &C, event: &event::Model) -> Result<String>
where
    C: ConnectionTrait,
{
    assign(db, event).await.map(SlugAssignment::into_slug)
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or `max_attempts`
/// attempts (at least one) have been made.
async fn retry_on_conflict<T, F, Fut>(event_id: i64, max_attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                warn!(
                    "Slug assignment for event {} failed (attempt {}/{}): {}",
                    event_id, attempt, max_attempts, e
                );
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}

async fn assign_retrying<C>(
    db: &C,
    event: &event::Model,
    max_attempts: u32,
) -> Result<SlugAssignment>
where
    C: ConnectionTrait,
{
    retry_on_conflict(event.id, max_attempts, || assign(db, event)).await
}

/// [`assign_if_missing`], retried while the write is rejected by the unique index.
///
/// At most `max_attempts` attempts are made (at least one). Other errors are returned
/// immediately.
///
/// # Errors
/// Returns the last error once attempts are exhausted, or the first non-retryable one.
#[instrument(skip(db, event), fields(event_id = event.id))]
pub async fn assign_with_retry<C>(db: &C, event: &event::Model, max_attempts: u32) -> Result<String>
where
    C: ConnectionTrait,
{
    assign_retrying(db, event, max_attempts)
        .await
        .map(SlugAssignment::into_slug)
}

/// Assigns slugs to every event in `events` that lacks one.
///
/// Each record gets up to `max_attempts` attempts when its write loses a slug race.
/// Records are processed independently: a failure is logged, recorded in the report,
/// and the run moves on to the next record.
pub async fn backfill<C>(db: &C, events: &[event::Model], max_attempts: u32) -> BackfillReport
where
    C: ConnectionTrait,
{
    let mut report = BackfillReport::default();

    for event in events {
        if event.assigned_slug().is_some() {
            report.skipped += 1;
            continue;
        }

        match assign_retrying(db, event, max_attempts).await {
            Ok(SlugAssignment::Assigned(_)) => report.updated += 1,
            Ok(SlugAssignment::Existing(slug)) => {
                debug!("Event {} was assigned '{}' concurrently", event.id, slug);
                report.skipped += 1;
            }
            Err(e) => {
                error!("Failed to assign slug to event {}: {}", event.id, e);
                report.failures.push(BackfillFailure {
                    event_id: event.id,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        "Slug backfill finished: {} updated, {} skipped, {} failed.",
        report.updated,
        report.skipped,
        report.failures.len()
    );
    report
}

/// Loads every event without a slug and runs [`backfill`] over them.
///
/// # Errors
/// Returns an error only if loading the events fails; per-record failures are in the
/// report.
pub async fn backfill_all<C>(db: &C, max_attempts: u32) -> Result<BackfillReport>
where
    C: ConnectionTrait,
{
    let events = crate::core::event::get_events_missing_slug(db).await?;
    info!("Found {} events without a slug.", events.len());
    Ok(backfill(db, &events, max_attempts).await)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::collections::HashSet;

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("Hello, World!!!"), "hello-world");
        assert_eq!(normalize_title("   multiple   spaces "), "multiple-spaces");
        assert_eq!(normalize_title("!!!"), "event");
        assert_eq!(normalize_title(""), "event");
        assert_eq!(normalize_title("Hackathon"), "hackathon");
        assert_eq!(normalize_title("Rust -- Meetup  #42"), "rust-meetup-42");
        assert_eq!(normalize_title("--leading and trailing--"), "leading-and-trailing");
        assert_eq!(normalize_title("snake_case_title"), "snakecasetitle");
        assert_eq!(normalize_title("Tab\tand\nnewline"), "tab-and-newline");
    }

    #[test]
    fn test_normalize_title_drops_non_ascii_letters() {
        assert_eq!(normalize_title("Café Night"), "caf-night");
        assert_eq!(normalize_title("東京 ミートアップ"), "event");
        assert_eq!(normalize_title("東京 2024"), "2024");
    }

    #[tokio::test]
    async fn test_collision_resolution_appends_next_free_suffix() -> Result<()> {
        init_test_tracing();
        let db = setup_test_db().await?;

        insert_event_with_slug(&db, "Hackathon", "hackathon").await?;
        insert_event_with_slug(&db, "Hackathon again", "hackathon-1").await?;
        let event = insert_legacy_event(&db, "Hackathon").await?;

        let slug = assign_if_missing(&db, &event).await?;
        assert_eq!(slug, "hackathon-2");

        let stored = Event::find_by_id(event.id).one(&db).await?.unwrap();
        assert_eq!(stored.slug.as_deref(), Some("hackathon-2"));
        Ok(())
    }

    #[tokio::test]
    async fn test_resolution_ignores_the_event_itself() -> Result<()> {
        let db = setup_test_db().await?;

        let event = insert_event_with_slug(&db, "Demo Day", "demo-day").await?;
        let candidate = resolve_unique_slug(&db, "demo-day", event.id).await?;
        assert_eq!(candidate, "demo-day");
        Ok(())
    }

    #[tokio::test]
    async fn test_assign_if_missing_is_noop_for_existing_slug() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let event = event_model(7, "Anything", Some("foo"));

        let slug = assign_if_missing(&db, &event).await?;
        assert_eq!(slug, "foo");

        assert!(db.into_transaction_log().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_assign_if_missing_is_idempotent() -> Result<()> {
        init_test_tracing();
        let db = setup_test_db().await?;

        let event = insert_legacy_event(&db, "Spring Hackathon").await?;
        let first = assign_if_missing(&db, &event).await?;

        // Same stale snapshot again: the conditional write sees the slug and keeps it
        let second = assign_if_missing(&db, &event).await?;
        assert_eq!(first, "spring-hackathon");
        assert_eq!(second, first);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_slug_counts_as_missing() -> Result<()> {
        let db = setup_test_db().await?;

        let event = insert_event_with_slug(&db, "Launch Party", "").await?;
        assert_eq!(assign_if_missing(&db, &event).await?, "launch-party");
        Ok(())
    }

    #[tokio::test]
    async fn test_storage_rejects_duplicate_slug_and_retry_recovers() -> Result<()> {
        init_test_tracing();
        let db = setup_test_db().await?;

        let first = insert_legacy_event(&db, "Hackathon").await?;
        let second = insert_legacy_event(&db, "HACKATHON!").await?;

        // The second writer computes its candidate before the first one commits
        let stale_candidate = resolve_unique_slug(&db, "hackathon", second.id).await?;
        assert_eq!(stale_candidate, "hackathon");
        assert_eq!(assign_if_missing(&db, &first).await?, "hackathon");

        let err = persist_slug(&db, second.id, &stale_candidate).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateSlug { ref slug } if slug == "hackathon"));
        assert!(err.is_persistence());

        let stored = Event::find_by_id(second.id).one(&db).await?.unwrap();
        assert!(stored.slug.is_none());

        // Retrying recomputes against the committed state
        assert_eq!(assign_if_missing(&db, &second).await?, "hackathon-1");
        Ok(())
    }

    #[tokio::test]
    async fn test_persist_slug_outcomes() -> Result<()> {
        let db = setup_test_db().await?;

        let err = persist_slug(&db, 404, "ghost").await.unwrap_err();
        assert!(matches!(err, Error::EventNotFound { id: 404 }));

        let event = insert_legacy_event(&db, "Workshop").await?;
        let written = persist_slug(&db, event.id, "workshop").await?;
        assert!(written.was_written());
        let again = persist_slug(&db, event.id, "workshop-other").await?;
        assert!(!again.was_written());
        assert_eq!(again.slug(), "workshop");
        Ok(())
    }

    #[tokio::test]
    async fn test_assign_with_retry_stops_on_non_retryable_error() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([Vec::<event::Model>::new()])
            .append_exec_errors([DbErr::Custom("connection reset".to_string())])
            .into_connection();
        let event = event_model(1, "Meetup", None);

        let err = assign_with_retry(&db, &event, 3).await.unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        // Non-retryable errors stop after the first attempt
        assert_eq!(db.into_transaction_log().len(), 2);
        Ok(())
    }

    fn duplicate(slug: &str) -> Error {
        Error::DuplicateSlug {
            slug: slug.to_string(),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_after_duplicate_slug() -> Result<()> {
        let mut calls = 0;
        let slug = retry_on_conflict(1, 3, || {
            calls += 1;
            let outcome = if calls == 1 {
                Err(duplicate("hackathon"))
            } else {
                Ok("hackathon-1".to_string())
            };
            async move { outcome }
        })
        .await?;

        assert_eq!(slug, "hackathon-1");
        assert_eq!(calls, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<String> = retry_on_conflict(1, 3, || {
            calls += 1;
            async { Err(duplicate("hackathon")) }
        })
        .await;

        assert!(matches!(result, Err(Error::DuplicateSlug { .. })));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_retry_makes_at_least_one_attempt() {
        let mut calls = 0;
        let result: Result<String> = retry_on_conflict(1, 0, || {
            calls += 1;
            async { Err(duplicate("hackathon")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_backfill_assigns_unique_slugs() -> Result<()> {
        init_test_tracing();
        let db = setup_test_db().await?;

        insert_event_with_slug(&db, "Hackathon", "hackathon").await?;
        for title in ["Hackathon", "Hackathon", "Demo Day", "!!!", "???"] {
            insert_legacy_event(&db, title).await?;
        }

        let events = Event::find().all(&db).await?;
        let report = backfill(&db, &events, 1).await;
        assert_eq!(report.updated, 5);
        assert_eq!(report.skipped, 1);
        assert!(report.is_clean());

        let slugs: Vec<String> = Event::find()
            .all(&db)
            .await?
            .into_iter()
            .map(|e| e.slug.unwrap())
            .collect();
        let unique: HashSet<&String> = slugs.iter().collect();
        assert_eq!(unique.len(), slugs.len());
        for expected in ["hackathon", "hackathon-1", "hackathon-2", "demo-day", "event", "event-1"] {
            assert!(slugs.iter().any(|s| s == expected), "missing slug {expected}");
        }

        // A second pass has nothing left to do
        let rerun = backfill_all(&db, 1).await?;
        assert_eq!(rerun, BackfillReport::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_backfill_continues_past_vanished_record() -> Result<()> {
        init_test_tracing();
        let db = setup_test_db().await?;

        let first = insert_legacy_event(&db, "First Event").await?;
        let vanished = event_model(999, "Deleted Meanwhile", None);
        let last = insert_legacy_event(&db, "Last Event").await?;

        let report = backfill(&db, &[first.clone(), vanished, last.clone()], 3).await;
        assert_eq!(report.updated, 2);
        assert_eq!(report.failed_ids(), vec![999]);

        let first = Event::find_by_id(first.id).one(&db).await?.unwrap();
        let last = Event::find_by_id(last.id).one(&db).await?.unwrap();
        assert_eq!(first.slug.as_deref(), Some("first-event"));
        assert_eq!(last.slug.as_deref(), Some("last-event"));
        Ok(())
    }

    #[tokio::test]
    async fn test_backfill_isolates_write_failures() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([Vec::<event::Model>::new(), Vec::new()])
            .append_exec_errors([DbErr::Custom("disk I/O error".to_string())])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let events = [event_model(1, "Broken", None), event_model(2, "Fine", None)];

        let report = backfill(&db, &events, 1).await;
        assert_eq!(report.updated, 1);
        assert_eq!(report.failed_ids(), vec![1]);
        assert!(report.failures[0].reason.contains("disk I/O error"));
        Ok(())
    }
}
