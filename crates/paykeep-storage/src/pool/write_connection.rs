//! Single write connection behind `tokio::sync::Mutex`.
//! Serialized writes, no contention.

use std::path::Path;

use rusqlite::Connection;
use tokio::sync::Mutex;

use paykeep_core::errors::PaykeepResult;

use super::pragmas::apply_pragmas;
use crate::sqlite_err;

/// A single write connection protected by an async mutex.
pub struct WriteConnection {
    conn: Mutex<Connection>,
}

impl WriteConnection {
    /// Open a new write connection to the given database path.
    pub fn open(path: &Path, busy_timeout_ms: u32) -> PaykeepResult<Self> {
        let conn = Connection::open(path).map_err(sqlite_err)?;
        apply_pragmas(&conn, busy_timeout_ms)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> PaykeepResult<Self> {
        let conn = Connection::open_in_memory().map_err(sqlite_err)?;
        apply_pragmas(&conn, 0)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the write lock and execute a closure with the connection.
    pub async fn with_conn<F, T>(&self, f: F) -> PaykeepResult<T>
    where
        F: FnOnce(&Connection) -> PaykeepResult<T>,
    {
        let guard = self.conn.lock().await;
        f(&guard)
    }

    /// Lock-free access while the connection is still exclusively owned,
    /// before it is shared (migrations at startup).
    pub fn with_conn_exclusive<F, T>(&mut self, f: F) -> PaykeepResult<T>
    where
        F: FnOnce(&Connection) -> PaykeepResult<T>,
    {
        f(self.conn.get_mut())
    }
}
