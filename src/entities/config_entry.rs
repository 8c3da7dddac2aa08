//! Config entry entity - Stores the typed key-value settings that drive site content.
//!
//! Each entry maps a unique `key` to a string `value` whose meaning depends on its
//! `kind`: an uploaded image URL, plain text, or a video embed reference.

use crate::errors::Error;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// How a config value should be interpreted by the presentation layer.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum ConfigKind {
    /// URL of an uploaded image
    #[default]
    #[sea_orm(string_value = "image")]
    Image,
    /// Free text
    #[sea_orm(string_value = "text")]
    Text,
    /// Video embed reference
    #[sea_orm(string_value = "video")]
    Video,
}

impl ConfigKind {
    /// Lowercase name used in storage, TOML and API payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Text => "text",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKind {
    type Err = Error;

    fn from_str(s: &str) -> crate::errors::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "text" => Ok(Self::Text),
            "video" => Ok(Self::Video),
            other => Err(Error::validation(format!(
                "Unknown config kind '{other}', expected one of: image, text, video"
            ))),
        }
    }
}

/// Config entry database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "config_entries")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Settings key (e.g., `"hero_image"`), unique across all entries
    #[sea_orm(unique)]
    pub key: String,
    /// Text, URL or embed reference depending on `kind`
    #[sea_orm(column_type = "Text")]
    pub value: String,
    /// Interpretation of `value`
    pub kind: ConfigKind,
    /// When the key was first written
    pub created_at: DateTime,
    /// When the value was last written
    pub updated_at: DateTime,
}

/// `ConfigEntry` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
