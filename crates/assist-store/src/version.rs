//! Version tracker.
//!
//! The `schema_migrations` table holds one row per applied migration. The
//! current version of a file is the largest recorded version; a file
//! without the table is a fresh database at version 0.

use rusqlite::Connection;
use tracing::debug;

use assist_core::{AssistError, MigrationRecord, Result, SchemaVersion};

/// Name of the version-tracking table.
pub const TRACKING_TABLE: &str = "schema_migrations";

const CREATE_TRACKING_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS schema_migrations (version INTEGER PRIMARY KEY)";

/// Statement that records a migration as applied.
pub(crate) const RECORD_MIGRATION: &str = "INSERT INTO schema_migrations (version) VALUES (?1)";

/// Whether the tracking table exists.
pub fn tracking_table_exists(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [TRACKING_TABLE],
            |row| row.get(0),
        )
        .map_err(|e| AssistError::query(format!("Failed to look up {}: {}", TRACKING_TABLE, e)))?;
    Ok(count > 0)
}

/// Create the tracking table when it is missing.
pub fn ensure_tracking_table(conn: &Connection) -> Result<()> {
    if tracking_table_exists(conn)? {
        return Ok(());
    }
    conn.execute_batch(CREATE_TRACKING_TABLE).map_err(|e| {
        AssistError::query(format!("Failed to create {}: {}", TRACKING_TABLE, e))
    })?;
    debug!("Created {}", TRACKING_TABLE);
    Ok(())
}

/// Current schema version; 0 for a fresh file or an empty tracking table.
pub fn current_version(conn: &Connection) -> Result<SchemaVersion> {
    if !tracking_table_exists(conn)? {
        return Ok(0);
    }

    let version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| AssistError::query(format!("Failed to read schema version: {}", e)))?;

    to_version(version)
}

/// All recorded migrations, ascending. Empty for a fresh file.
pub fn applied_versions(conn: &Connection) -> Result<Vec<MigrationRecord>> {
    if !tracking_table_exists(conn)? {
        return Ok(Vec::new());
    }

    let mut stmt = conn
        .prepare("SELECT version FROM schema_migrations ORDER BY version")
        .map_err(|e| AssistError::query(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, i64>(0))
        .map_err(|e| AssistError::query(e.to_string()))?;

    let mut records = Vec::new();
    for row in rows {
        let version = row.map_err(|e| AssistError::query(e.to_string()))?;
        records.push(MigrationRecord {
            version: to_version(version)?,
        });
    }
    Ok(records)
}

fn to_version(raw: i64) -> Result<SchemaVersion> {
    SchemaVersion::try_from(raw)
        .map_err(|_| AssistError::query(format!("Invalid recorded schema version {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_is_version_zero() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(!tracking_table_exists(&conn).unwrap());
        assert_eq!(current_version(&conn).unwrap(), 0);
        assert!(applied_versions(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_empty_tracking_table_is_version_zero() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_tracking_table(&conn).unwrap();
        assert!(tracking_table_exists(&conn).unwrap());
        assert_eq!(current_version(&conn).unwrap(), 0);
    }

    #[test]
    fn test_ensure_tracking_table_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_tracking_table(&conn).unwrap();
        conn.execute(RECORD_MIGRATION, [1]).unwrap();
        ensure_tracking_table(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), 1);
    }

    #[test]
    fn test_current_version_is_max_record() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_tracking_table(&conn).unwrap();
        for version in [3, 1, 2] {
            conn.execute(RECORD_MIGRATION, [version]).unwrap();
        }

        assert_eq!(current_version(&conn).unwrap(), 3);
        let versions: Vec<_> = applied_versions(&conn)
            .unwrap()
            .into_iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn test_negative_record_is_query_error() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_tracking_table(&conn).unwrap();
        conn.execute(RECORD_MIGRATION, [-4]).unwrap();

        let err = current_version(&conn).unwrap_err();
        assert_eq!(err.error_code(), "QUERY_ERROR");
    }
}
