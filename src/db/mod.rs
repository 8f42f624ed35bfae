use crate::errors::{AppError, AppResult};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

mod tasks;

pub use tasks::GroupColumn;

const SCHEMA_SQL: &str = include_str!("schema.sql");
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Store handle shared by every request.
///
/// The connection is serialized behind a mutex; SQLite's busy timeout bounds
/// how long a writer waits on the file lock.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl Database {
    pub fn open(path: &Path, busy_timeout: Duration) -> AppResult<Self> {
        if path.as_os_str() == IN_MEMORY_PATH {
            return Self::open_in_memory();
        }
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path)?;
        Self::bootstrap(conn, busy_timeout, Some(path.to_path_buf()))
    }

    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(conn, Duration::from_secs(5), None)
    }

    fn bootstrap(conn: Connection, busy_timeout: Duration, db_path: Option<PathBuf>) -> AppResult<Self> {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Round-trips a trivial statement; used by readiness probes.
    pub fn ping(&self) -> AppResult<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::Database;
    use std::time::Duration;

    #[test]
    fn in_memory_database_is_ready() {
        let db = Database::open_in_memory().expect("db");
        db.ping().expect("ping");
        assert!(db.path().is_none());
    }

    #[test]
    fn file_database_creates_parent_dirs_and_reopens() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("nested").join("tasks.db");

        let db = Database::open(&db_path, Duration::from_millis(500)).expect("db");
        db.ping().expect("ping");
        assert_eq!(db.path(), Some(db_path.as_path()));
        drop(db);

        let reopened = Database::open(&db_path, Duration::from_millis(500)).expect("reopen");
        reopened.ping().expect("ping after reopen");
    }

    #[test]
    fn memory_path_opens_in_memory_store() {
        let db = Database::open(std::path::Path::new(":memory:"), Duration::from_secs(1)).expect("db");
        assert!(db.path().is_none());
    }
}
