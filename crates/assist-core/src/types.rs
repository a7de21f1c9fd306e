//! Core schema types shared by the store and the CLI.

use serde::{Deserialize, Serialize};

/// Structural version of a database file.
///
/// Zero means no migration has been recorded (a fresh file). The value only
/// ever grows over the lifetime of a file.
pub type SchemaVersion = u32;

/// A versioned, one-time structural change.
///
/// Migrations are immutable once released: corrections ship as a new
/// migration with a higher version, never as an edit to an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    /// Version this migration brings the file to.
    pub version: SchemaVersion,

    /// Short human-readable label.
    pub name: &'static str,

    /// Statements executed in declaration order inside one transaction.
    pub statements: &'static [&'static str],
}

impl Migration {
    /// Declare a migration. Usable in `const` catalogs.
    pub const fn new(
        version: SchemaVersion,
        name: &'static str,
        statements: &'static [&'static str],
    ) -> Self {
        Self {
            version,
            name,
            statements,
        }
    }

    /// Number of statements in this migration.
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }
}

/// Persisted evidence that a migration was fully applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub version: SchemaVersion,
}

/// Outcome of a successful upgrade run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeReport {
    /// Version found before the run.
    pub from: SchemaVersion,

    /// Version the file is at after the run.
    pub to: SchemaVersion,

    /// Versions applied by this run, ascending.
    pub applied: Vec<SchemaVersion>,
}

impl UpgradeReport {
    /// Report for a run that found nothing to do.
    pub fn unchanged(version: SchemaVersion) -> Self {
        Self {
            from: version,
            to: version,
            applied: Vec::new(),
        }
    }

    /// True when no migration was applied.
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}
