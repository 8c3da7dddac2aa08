//! Application settings loaded from config.toml
//!
//! The file holds the default site config entries to seed on start-up and the
//! retry budget used when a slug loses a race at write time. Every section is
//! optional.

use crate::entities::ConfigKind;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "EVENTSITE_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const DEFAULT_SLUG_MAX_ATTEMPTS: u32 = 5;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Slug assignment settings
    #[serde(default)]
    pub slugs: SlugConfig,
    /// Config entries to create when their key is missing
    #[serde(default)]
    pub defaults: Vec<DefaultEntryConfig>,
}

/// Slug assignment settings
#[derive(Debug, Deserialize)]
pub struct SlugConfig {
    /// How many times a write rejected by the unique index is retried
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for SlugConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_SLUG_MAX_ATTEMPTS,
        }
    }
}

const fn default_max_attempts() -> u32 {
    DEFAULT_SLUG_MAX_ATTEMPTS
}

/// A config entry seeded when its key does not exist yet
#[derive(Debug, Deserialize, Clone)]
pub struct DefaultEntryConfig {
    /// Settings key
    pub key: String,
    /// Initial value
    pub value: String,
    /// Value kind, `image` when omitted
    #[serde(default)]
    pub kind: ConfigKind,
}

/// Loads the configuration from a TOML file.
///
/// # Errors
/// Returns `Error::Config` if the file cannot be read, the TOML syntax is invalid,
/// or an entry has an unknown `kind`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<Config> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads the configuration from `$EVENTSITE_CONFIG` or `./config.toml`.
///
/// A missing file is not an error: the defaults apply. A file that exists but
/// cannot be parsed is.
pub fn load_default_config() -> Result<Config> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    if Path::new(&path).exists() {
        load_config(&path)
    } else {
        info!("No config file at {}, using defaults.", path);
        Ok(Config::default())
    }
}
