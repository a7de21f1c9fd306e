//! Migration runner.
//!
//! Every pending migration runs in its own IMMEDIATE transaction together
//! with the row that records it, so a version is either fully applied and
//! recorded or not visible at all. A failure stops the run; versions
//! committed before it stay in place and the next run resumes at the
//! failed version.

use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info, warn};

use assist_core::{AssistError, Migration, Result, SchemaVersion, UpgradeReport};

use crate::connection::DbHandle;
use crate::migrations::{latest_version, validate_catalog};
use crate::version::{current_version, ensure_tracking_table, RECORD_MIGRATION};

/// Bring the handle's database up to the latest version in `catalog`.
pub fn upgrade(handle: &DbHandle, catalog: &[Migration]) -> Result<UpgradeReport> {
    handle.with_conn_mut(|conn| upgrade_connection(conn, catalog))
}

/// Bring a raw connection up to the latest version in `catalog`.
///
/// The catalog is validated before anything is written. Migrations are
/// taken in declaration order, which validation guarantees is ascending.
pub fn upgrade_connection(conn: &mut Connection, catalog: &[Migration]) -> Result<UpgradeReport> {
    validate_catalog(catalog)?;
    let latest = latest_version(catalog);

    ensure_tracking_table(conn)?;
    let from = current_version(conn)?;

    if from > latest {
        return Err(AssistError::UnsupportedVersion {
            found: from,
            latest,
        });
    }
    if from == latest {
        debug!("Schema is current at version {}", from);
        return Ok(UpgradeReport::unchanged(from));
    }

    info!("Upgrading schema from version {} to {}", from, latest);

    let mut version = from;
    let mut applied = Vec::new();
    for migration in catalog.iter().filter(|m| m.version > from) {
        apply(conn, migration, version)?;
        info!(
            "Applied migration {} ({})",
            migration.version, migration.name
        );
        version = migration.version;
        applied.push(version);
    }

    Ok(UpgradeReport {
        from,
        to: version,
        applied,
    })
}

fn apply(conn: &mut Connection, migration: &Migration, last_committed: SchemaVersion) -> Result<()> {
    let failed = |statement: &str, e: rusqlite::Error| AssistError::Migration {
        version: migration.version,
        statement: statement.trim().to_string(),
        last_committed,
        message: e.to_string(),
    };

    // IMMEDIATE takes the write lock up front, waiting at most busy_timeout.
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| failed("BEGIN IMMEDIATE", e))?;

    for (index, statement) in migration.statements.iter().enumerate() {
        debug!(
            "Migration {} statement {}/{}",
            migration.version,
            index + 1,
            migration.statement_count()
        );
        if let Err(e) = tx.execute_batch(statement) {
            warn!(
                "Migration {} failed at statement {}, rolling back",
                migration.version,
                index + 1
            );
            let err = failed(statement, e);
            if let Err(rollback) = tx.rollback() {
                warn!("Rollback of migration {} failed: {}", migration.version, rollback);
            }
            return Err(err);
        }
    }

    if let Err(e) = tx.execute(RECORD_MIGRATION, [migration.version]) {
        warn!("Recording migration {} failed, rolling back", migration.version);
        let err = failed(RECORD_MIGRATION, e);
        if let Err(rollback) = tx.rollback() {
            warn!("Rollback of migration {} failed: {}", migration.version, rollback);
        }
        return Err(err);
    }

    tx.commit().map_err(|e| failed("COMMIT", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::applied_versions;

    const CATALOG: &[Migration] = &[
        Migration::new(1, "alpha", &["CREATE TABLE alpha (id INTEGER PRIMARY KEY)"]),
        Migration::new(
            2,
            "beta",
            &[
                "CREATE TABLE beta (id INTEGER PRIMARY KEY)",
                "CREATE INDEX idx_beta_id ON beta(id)",
            ],
        ),
    ];

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            > 0
    }

    #[test]
    fn test_upgrade_fresh_database() {
        let mut conn = Connection::open_in_memory().unwrap();
        let report = upgrade_connection(&mut conn, CATALOG).unwrap();

        assert_eq!(report.from, 0);
        assert_eq!(report.to, 2);
        assert_eq!(report.applied, vec![1, 2]);
        assert!(table_exists(&conn, "alpha"));
        assert!(table_exists(&conn, "beta"));
    }

    #[test]
    fn test_empty_catalog_creates_tracking_table_only() {
        let mut conn = Connection::open_in_memory().unwrap();
        let report = upgrade_connection(&mut conn, &[]).unwrap();

        assert!(report.is_noop());
        assert_eq!(report.to, 0);
        assert!(table_exists(&conn, "schema_migrations"));
    }

    #[test]
    fn test_failed_record_insert_rolls_back() {
        let mut conn = Connection::open_in_memory().unwrap();
        ensure_tracking_table(&conn).unwrap();
        // Make the final step of the first migration fail.
        conn.execute_batch(
            "CREATE TRIGGER no_records BEFORE INSERT ON schema_migrations \
             BEGIN SELECT RAISE(ABORT, 'records frozen'); END;",
        )
        .unwrap();

        let err = upgrade_connection(&mut conn, CATALOG).unwrap_err();
        match err {
            AssistError::Migration {
                version,
                last_committed,
                message,
                ..
            } => {
                assert_eq!(version, 1);
                assert_eq!(last_committed, 0);
                assert!(message.contains("records frozen"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!table_exists(&conn, "alpha"));
        assert!(applied_versions(&conn).unwrap().is_empty());
    }
}
