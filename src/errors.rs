//! Unified error types and result handling.
//!
//! Validation failures are reported before anything touches the database.
//! Everything the backend rejects is a persistence failure; a slug that
//! collides at write time gets its own variant because it is the one failure
//! a caller is expected to retry.

use sea_orm::DbErr;
use thiserror::Error;

/// Every error this crate can return.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input: blank key, value or title, or an unknown entry kind.
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// The configuration file could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the failure
        message: String,
    },

    /// The database was unavailable or rejected a statement.
    #[error("Persistence error: {0}")]
    Persistence(#[from] DbErr),

    /// The `events.slug` unique index rejected the write.
    #[error("Slug '{slug}' is already taken by another event")]
    DuplicateSlug {
        /// The candidate that lost the race
        slug: String,
    },

    /// The event being assigned a slug no longer exists.
    #[error("Event not found: {id}")]
    EventNotFound {
        /// Primary key that was looked up
        id: i64,
    },
}

impl Error {
    /// Builds a [`Error::Validation`] from anything string-like.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// True for failures raised by the storage layer, including unique
    /// constraint violations.
    #[must_use]
    pub const fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::DuplicateSlug { .. })
    }

    /// True when re-invoking the operation can succeed against fresh state.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::DuplicateSlug { .. })
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
