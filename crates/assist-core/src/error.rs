//! Error types for the storage layer.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::SchemaVersion;

/// Result type alias using AssistError.
pub type Result<T> = std::result::Result<T, AssistError>;

/// Errors that can occur while opening and upgrading the database.
#[derive(Error, Debug)]
pub enum AssistError {
    /// The database file could not be created or opened.
    #[error("Cannot open database at {}: {message}", .path.display())]
    Connection { path: PathBuf, message: String },

    /// An engine parameter was rejected or did not take effect.
    #[error("Cannot apply setting {setting}: {message}")]
    Configuration { setting: String, message: String },

    /// Reading schema state failed.
    #[error("Query error: {message}")]
    Query { message: String },

    /// A statement of a migration failed; the migration was rolled back.
    #[error(
        "Migration to version {version} failed (last committed version {last_committed}): {message}; statement: {statement}"
    )]
    Migration {
        version: SchemaVersion,
        statement: String,
        last_committed: SchemaVersion,
        message: String,
    },

    /// The migration catalog violates its ordering rules.
    #[error("Invalid migration catalog: {message}")]
    Catalog { message: String },

    /// The file was written by newer software than this build.
    #[error("Database is at schema version {found}, newer than the latest known version {latest}")]
    UnsupportedVersion {
        found: SchemaVersion,
        latest: SchemaVersion,
    },

    /// Configuration file error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssistError {
    /// Create a connection error for the given path.
    pub fn connection(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Connection {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error for a named engine setting.
    pub fn configuration(setting: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            setting: setting.into(),
            message: message.into(),
        }
    }

    /// Create a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a catalog error.
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }

    /// Version the file is known to be at when this error was raised, if any.
    pub fn last_committed(&self) -> Option<SchemaVersion> {
        match self {
            Self::Migration { last_committed, .. } => Some(*last_committed),
            Self::UnsupportedVersion { found, .. } => Some(*found),
            _ => None,
        }
    }

    /// Whether a later process start may succeed without intervention.
    ///
    /// Only migration failures qualify: committed versions stay in place and
    /// the next run resumes at the failed version.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Migration { .. })
    }

    /// Stable code for logs and machine-readable output.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "CONNECTION_ERROR",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Query { .. } => "QUERY_ERROR",
            Self::Migration { .. } => "MIGRATION_ERROR",
            Self::Catalog { .. } => "CATALOG_ERROR",
            Self::UnsupportedVersion { .. } => "UNSUPPORTED_VERSION",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }
}
