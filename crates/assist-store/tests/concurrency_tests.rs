use assist_core::{AssistError, DurabilityConfig};
use assist_store::{current_version, durability, upgrade, ConnectionProvider, DbHandle, MIGRATIONS};
use rusqlite::Connection;
use tempfile::TempDir;

fn open_with(dir: &TempDir, busy_timeout_ms: u32) -> DbHandle {
    let handle = ConnectionProvider::new()
        .open(dir.path().join("assist.db"))
        .expect("open");
    let config = DurabilityConfig {
        busy_timeout_ms,
        ..DurabilityConfig::default()
    };
    durability::configure(&handle, &config).expect("configure");
    handle
}

#[test]
fn reader_does_not_block_migration() {
    let dir = TempDir::new().expect("tempdir");
    let handle = open_with(&dir, 5000);
    upgrade(&handle, &MIGRATIONS[..1]).expect("v1");

    let reader = Connection::open(dir.path().join("assist.db")).expect("reader");
    reader.execute_batch("BEGIN").expect("begin read");
    let seen: i64 = reader
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
        .expect("read");
    assert_eq!(seen, 1);

    let report = upgrade(&handle, MIGRATIONS).expect("upgrade alongside reader");
    assert_eq!(report.to, 5);

    // The open read transaction keeps its snapshot.
    let still: i64 = reader
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
        .expect("read again");
    assert_eq!(still, 1);

    reader.execute_batch("COMMIT").expect("end read");
    let now: i64 = reader
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
        .expect("read after commit");
    assert_eq!(now, 5);
}

#[test]
fn held_write_lock_times_out_and_run_resumes_later() {
    let dir = TempDir::new().expect("tempdir");
    let handle = open_with(&dir, 50);
    upgrade(&handle, &MIGRATIONS[..1]).expect("v1");

    let writer = Connection::open(dir.path().join("assist.db")).expect("writer");
    writer.execute_batch("BEGIN IMMEDIATE").expect("hold write lock");

    let err = upgrade(&handle, MIGRATIONS).expect_err("lock is held");
    match &err {
        AssistError::Migration {
            version,
            last_committed,
            statement,
            ..
        } => {
            assert_eq!(*version, 2);
            assert_eq!(*last_committed, 1);
            assert_eq!(statement, "BEGIN IMMEDIATE");
        }
        other => panic!("unexpected error: {other}"),
    }

    let version = handle
        .with_conn(|conn| current_version(conn))
        .expect("version");
    assert_eq!(version, 1);

    writer.execute_batch("ROLLBACK").expect("release lock");

    let report = upgrade(&handle, MIGRATIONS).expect("retry");
    assert_eq!(report.applied, vec![2, 3, 4, 5]);
}
