//! Durability configurator.
//!
//! Applies the engine parameters every connection needs before any schema
//! work happens. Each setting is read back after it is applied; a setting
//! that does not stick is a fatal configuration error.

use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use assist_core::{AssistError, DurabilityConfig, Result};

use crate::connection::DbHandle;

/// Apply `config` to the handle's connection.
pub fn configure(handle: &DbHandle, config: &DurabilityConfig) -> Result<()> {
    let in_memory = handle.is_in_memory();
    handle.with_conn(|conn| configure_connection(conn, config, in_memory))
}

/// Apply `config` to a raw connection.
///
/// Order: foreign keys, journal mode, synchronous, busy timeout, automatic
/// checkpoint threshold. Foreign keys and WAL are always turned on; the
/// remaining settings come from `config`.
pub fn configure_connection(
    conn: &Connection,
    config: &DurabilityConfig,
    in_memory: bool,
) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| rejected("foreign_keys", e))?;
    let enabled: i64 = conn
        .pragma_query_value(None, "foreign_keys", |row| row.get(0))
        .map_err(|e| rejected("foreign_keys", e))?;
    check("foreign_keys", enabled == 1, enabled)?;
    debug!("foreign_keys = ON");

    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .map_err(|e| rejected("journal_mode", e))?;
    let mode = mode.to_lowercase();
    // In-memory databases cannot use a WAL file and always report "memory".
    let memory_fallback = in_memory && mode == "memory";
    check("journal_mode", mode == "wal" || memory_fallback, &mode)?;
    debug!("journal_mode = {}", mode);

    conn.pragma_update(None, "synchronous", config.synchronous.as_pragma())
        .map_err(|e| rejected("synchronous", e))?;
    let level: i64 = conn
        .pragma_query_value(None, "synchronous", |row| row.get(0))
        .map_err(|e| rejected("synchronous", e))?;
    check("synchronous", level == config.synchronous.level(), level)?;
    debug!("synchronous = {}", config.synchronous.as_pragma());

    // SQLite takes the timeout as a C int.
    if i32::try_from(config.busy_timeout_ms).is_err() {
        return Err(AssistError::configuration(
            "busy_timeout",
            format!(
                "{}ms exceeds the engine limit of {}ms",
                config.busy_timeout_ms,
                i32::MAX
            ),
        ));
    }
    conn.busy_timeout(Duration::from_millis(u64::from(config.busy_timeout_ms)))
        .map_err(|e| rejected("busy_timeout", e))?;
    let timeout: i64 = conn
        .pragma_query_value(None, "busy_timeout", |row| row.get(0))
        .map_err(|e| rejected("busy_timeout", e))?;
    check(
        "busy_timeout",
        timeout == i64::from(config.busy_timeout_ms),
        timeout,
    )?;
    debug!("busy_timeout = {}ms", timeout);

    let pages: i64 = conn
        .pragma_update_and_check(None, "wal_autocheckpoint", config.wal_autocheckpoint, |row| {
            row.get(0)
        })
        .map_err(|e| rejected("wal_autocheckpoint", e))?;
    check(
        "wal_autocheckpoint",
        pages == i64::from(config.wal_autocheckpoint),
        pages,
    )?;
    debug!("wal_autocheckpoint = {} pages", pages);

    Ok(())
}

fn rejected(setting: &str, e: rusqlite::Error) -> AssistError {
    AssistError::configuration(setting, e.to_string())
}

fn check(setting: &str, ok: bool, actual: impl std::fmt::Display) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(AssistError::configuration(
            setting,
            format!("engine reports {}", actual),
        ))
    }
}
