/// Database configuration and connection management
pub mod database;

/// Seed entries and slug settings loaded from config.toml
pub mod settings;
