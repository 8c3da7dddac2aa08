//! Core business logic - framework-agnostic operations over a `SeaORM` connection.
//!
//! Every function takes any [`sea_orm::ConnectionTrait`], so callers can pass a plain
//! connection or a transaction.

/// Typed key-value site settings
pub mod config_store;
/// Slug-relevant event records
pub mod event;
/// Slug derivation, uniqueness and backfill
pub mod slug;
