//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod config_entry;
pub mod event;

// Re-export specific types to avoid conflicts
pub use config_entry::{
    Column as ConfigEntryColumn, ConfigKind, Entity as ConfigEntry, Model as ConfigEntryModel,
};
pub use event::{Column as EventColumn, Entity as Event, Model as EventModel};
