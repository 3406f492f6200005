//! The `lastSync` marker.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use paykeep_core::constants::LAST_SYNC_KEY;
use paykeep_core::errors::PaykeepResult;

use super::{from_millis, to_millis};
use crate::sqlite_err;

pub fn last_sync(conn: &Connection) -> PaykeepResult<Option<DateTime<Utc>>> {
    let ms: Option<i64> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            params![LAST_SYNC_KEY],
            |row| row.get(0),
        )
        .optional()
        .map_err(sqlite_err)?;
    ms.map(from_millis).transpose()
}

/// Set or clear the marker.
pub fn set_last_sync(conn: &Connection, at: Option<DateTime<Utc>>) -> PaykeepResult<()> {
    match at {
        Some(at) => conn.execute(
            "INSERT INTO metadata (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![LAST_SYNC_KEY, to_millis(at)],
        ),
        None => conn.execute("DELETE FROM metadata WHERE key = ?1", params![LAST_SYNC_KEY]),
    }
    .map_err(sqlite_err)?;
    Ok(())
}

pub fn clear_metadata(conn: &Connection) -> PaykeepResult<()> {
    conn.execute("DELETE FROM metadata", []).map_err(sqlite_err)?;
    Ok(())
}
