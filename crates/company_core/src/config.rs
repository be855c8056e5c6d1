//! Environment-driven application configuration.
//!
//! # Responsibility
//! - Collect the producer label, storage location, event topic and logging
//!   settings a process needs to assemble the company service.
//!
//! # Invariants
//! - `APP_NAME` is required and never blank.
//! - `LOG_DIR`, when set, is absolute.

use crate::logging::{default_log_level, normalize_level};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_APP_NAME: &str = "APP_NAME";
pub const ENV_DB_PATH: &str = "DB_PATH";
pub const ENV_EVENTS_TOPIC: &str = "EVENTS_TOPIC";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "LOG_DIR";

pub const DEFAULT_EVENTS_TOPIC: &str = "companies";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(key) => write!(f, "required environment variable `{key}` is not set"),
            Self::Invalid { key, message } => write!(f, "invalid `{key}`: {message}"),
        }
    }
}

impl Error for ConfigError {}

/// Process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Producer label stamped on every event.
    pub app_name: String,
    /// SQLite file; `None` selects a private in-memory database.
    pub db_path: Option<PathBuf>,
    pub events_topic: String,
    pub log_level: &'static str,
    /// Rotating log files go here; `None` logs to stderr.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through an arbitrary key lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let app_name = read(ENV_APP_NAME).ok_or(ConfigError::Missing(ENV_APP_NAME))?;

        let log_level = match read(ENV_LOG_LEVEL) {
            Some(value) => normalize_level(&value).map_err(|message| ConfigError::Invalid {
                key: ENV_LOG_LEVEL,
                message,
            })?,
            None => default_log_level(),
        };

        let log_dir = read(ENV_LOG_DIR).map(PathBuf::from);
        if let Some(dir) = &log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid {
                    key: ENV_LOG_DIR,
                    message: format!("expected an absolute path, got `{}`", dir.display()),
                });
            }
        }

        Ok(Self {
            app_name,
            db_path: read(ENV_DB_PATH).map(PathBuf::from),
            events_topic: read(ENV_EVENTS_TOPIC)
                .unwrap_or_else(|| DEFAULT_EVENTS_TOPIC.to_string()),
            log_level,
            log_dir,
        })
    }
}
