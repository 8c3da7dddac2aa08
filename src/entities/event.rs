//! Event entity - The slug-relevant projection of an event record.
//!
//! Legacy events have no slug. Once assigned, a slug is left untouched by normal
//! read and update paths; the unique index on `slug` is what guarantees no two
//! events ever share one.

use async_trait::async_trait;
use sea_orm::{ActiveValue, Set, entity::prelude::*};
use serde::{Deserialize, Serialize};

/// Event database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "events")]
pub struct Model {
    /// Unique identifier for the event
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-readable title (e.g., "Spring Hackathon 2024")
    pub title: String,
    /// URL-safe identifier derived from the title, `None` until assigned
    #[sea_orm(unique)]
    pub slug: Option<String>,
    /// When the event was created
    pub created_at: DateTime,
    /// When the event was last modified
    pub updated_at: DateTime,
}

impl Model {
    /// Returns the slug if one has been assigned. Empty strings count as missing.
    #[must_use]
    pub fn assigned_slug(&self) -> Option<&str> {
        self.slug.as_deref().filter(|s| !s.is_empty())
    }
}

/// `Event` has no relationships modelled here
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    /// Stores blank slugs as `NULL`, so legacy records without a slug never collide on
    /// the unique index.
    async fn before_save<C>(mut self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if matches!(&self.slug, ActiveValue::Set(Some(slug)) if slug.trim().is_empty()) {
            self.slug = Set(None);
        }
        Ok(self)
    }
}
