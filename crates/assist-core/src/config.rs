//! Configuration types for the storage layer.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application directory name under the platform data and config dirs.
pub const APP_DIR: &str = "industrial-assist";

/// Fixed database file name.
pub const DB_FILE_NAME: &str = "industrial_assist.db";

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Engine parameters applied on every open.
    #[serde(default)]
    pub durability: DurabilityConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            durability: DurabilityConfig::default(),
        }
    }
}

/// Engine-level operating parameters.
///
/// Not persisted; re-applied on every connection open. Foreign key
/// enforcement and write-ahead logging are always on and have no switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DurabilityConfig {
    /// Synchronization level.
    #[serde(default)]
    pub synchronous: SynchronousMode,

    /// How long to wait for a lock before failing, in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u32,

    /// WAL size in pages that triggers an automatic checkpoint.
    #[serde(default = "default_wal_autocheckpoint")]
    pub wal_autocheckpoint: u32,
}

impl Default for DurabilityConfig {
    fn default() -> Self {
        Self {
            synchronous: SynchronousMode::default(),
            busy_timeout_ms: 5000,
            wal_autocheckpoint: 1000,
        }
    }
}

/// SQLite `synchronous` levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynchronousMode {
    Off,
    /// Sync at checkpoints only. Survives process crashes; a power loss may
    /// drop the most recent commits.
    #[default]
    Normal,
    Full,
    Extra,
}

impl SynchronousMode {
    /// Keyword used in `PRAGMA synchronous = ...`.
    pub fn as_pragma(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Normal => "NORMAL",
            Self::Full => "FULL",
            Self::Extra => "EXTRA",
        }
    }

    /// Numeric value reported back by `PRAGMA synchronous`.
    pub fn level(&self) -> i64 {
        match self {
            Self::Off => 0,
            Self::Normal => 1,
            Self::Full => 2,
            Self::Extra => 3,
        }
    }
}

// Default value functions

fn default_busy_timeout() -> u32 {
    5000
}

fn default_wal_autocheckpoint() -> u32 {
    1000
}

/// Default database location in the per-user application data directory.
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(DB_FILE_NAME)
}

impl AssistConfig {
    /// Load configuration from file.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> crate::error::Result<Self> {
        toml::from_str(content).map_err(|e| crate::error::AssistError::Config {
            message: format!("Failed to parse config: {}", e),
        })
    }

    /// Load configuration from default paths.
    pub fn load_default() -> crate::error::Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join(APP_DIR).join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from(format!("{}.toml", APP_DIR));
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }
}
