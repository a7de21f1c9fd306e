//! Connection provider.
//!
//! A process owns exactly one connection to the database file. The provider
//! opens it on first use and hands out clones of the same [`DbHandle`]
//! afterwards, so every component that needs the database shares the
//! already-configured, already-migrated connection.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use assist_core::{AssistError, Result};

/// Path reported for in-memory databases.
pub const MEMORY_PATH: &str = ":memory:";

/// Shared handle to the process-wide connection.
///
/// Clones refer to the same underlying connection.
#[derive(Debug, Clone)]
pub struct DbHandle {
    /// Connection wrapped in blocking Mutex.
    conn: Arc<Mutex<Connection>>,

    /// Location the connection was opened at.
    path: PathBuf,

    in_memory: bool,
}

impl DbHandle {
    fn new(conn: Connection, path: PathBuf, in_memory: bool) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
            in_memory,
        }
    }

    /// Open an existing database file without write access.
    ///
    /// Nothing is created and no engine parameters are applied, so the file
    /// is left exactly as found. The handle is independent of any provider.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<DbHandle> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| AssistError::connection(path, format!("Failed to open database: {}", e)))?;

        conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| AssistError::connection(path, format!("Unreadable database file: {}", e)))?;

        debug!("Database opened read-only at {:?}", path);
        Ok(DbHandle::new(conn, normalize(path), false))
    }

    /// Path of the database file, or `:memory:`.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this handle refers to an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    /// Whether both handles share one underlying connection.
    pub fn same_connection(&self, other: &DbHandle) -> bool {
        Arc::ptr_eq(&self.conn, &other.conn)
    }

    /// Execute a blocking operation on the connection.
    pub fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| AssistError::query(format!("Connection lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Execute a mutable blocking operation on the connection.
    pub fn with_conn_mut<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> Result<R>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| AssistError::query(format!("Connection lock poisoned: {}", e)))?;
        f(&mut conn)
    }
}

/// Opens the database once and returns the same handle on every later call.
#[derive(Debug, Default)]
pub struct ConnectionProvider {
    slot: Mutex<Option<DbHandle>>,
}

impl ConnectionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open or create the database at `path`.
    ///
    /// The parent directory is created when missing. Calling this again with
    /// the same path returns a handle to the same connection; a different
    /// path is rejected because the provider is bound to a single database.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<DbHandle> {
        let path = path.as_ref();
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| AssistError::connection(path, format!("Provider lock poisoned: {}", e)))?;

        if let Some(handle) = slot.as_ref() {
            if !handle.in_memory && normalize(path) == handle.path {
                debug!("Reusing open connection to {:?}", handle.path);
                return Ok(handle.clone());
            }
            return Err(AssistError::connection(
                path,
                format!("Provider is already bound to {}", handle.path.display()),
            ));
        }

        let handle = open_file(path)?;
        *slot = Some(handle.clone());
        Ok(handle)
    }

    /// Open a private in-memory database (for testing).
    pub fn open_in_memory(&self) -> Result<DbHandle> {
        let mut slot = self.slot.lock().map_err(|e| {
            AssistError::connection(MEMORY_PATH, format!("Provider lock poisoned: {}", e))
        })?;

        if let Some(handle) = slot.as_ref() {
            if handle.in_memory {
                return Ok(handle.clone());
            }
            return Err(AssistError::connection(
                MEMORY_PATH,
                format!("Provider is already bound to {}", handle.path.display()),
            ));
        }

        let conn = Connection::open_in_memory().map_err(|e| {
            AssistError::connection(
                MEMORY_PATH,
                format!("Failed to open in-memory database: {}", e),
            )
        })?;
        let handle = DbHandle::new(conn, PathBuf::from(MEMORY_PATH), true);
        *slot = Some(handle.clone());
        Ok(handle)
    }

    /// Handle opened by this provider, if any.
    pub fn current(&self) -> Option<DbHandle> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

fn open_file(path: &Path) -> Result<DbHandle> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AssistError::connection(
                    path,
                    format!("Failed to create directory {}: {}", parent.display(), e),
                )
            })?;
        }
    }

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| AssistError::connection(path, format!("Failed to open database: {}", e)))?;

    // SQLite reads the header lazily; touch it so a corrupt file fails here.
    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })
    .map_err(|e| AssistError::connection(path, format!("Unreadable database file: {}", e)))?;

    let path = normalize(path);
    info!("Database opened at {:?}", path);

    Ok(DbHandle::new(conn, path, false))
}

fn normalize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
