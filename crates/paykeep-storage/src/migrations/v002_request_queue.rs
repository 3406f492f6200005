//! v002: request_queue and its multipart parts.
//!
//! File parts keep their bytes in a native BLOB column.

use rusqlite::Connection;

use paykeep_core::errors::PaykeepResult;

use crate::sqlite_err;

pub fn migrate(conn: &Connection) -> PaykeepResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS request_queue (
            id                     TEXT PRIMARY KEY,
            seq                    INTEGER NOT NULL,
            method                 TEXT NOT NULL,
            url                    TEXT NOT NULL,
            headers                TEXT NOT NULL DEFAULT '{}',
            body_type              TEXT NOT NULL,
            body_json              TEXT,
            attempts               INTEGER NOT NULL DEFAULT 0,
            max_attempts           INTEGER NOT NULL,
            status                 TEXT NOT NULL DEFAULT 'pending',
            created_at             INTEGER NOT NULL,
            updated_at             INTEGER NOT NULL,
            available_at           INTEGER NOT NULL,
            last_error             TEXT,
            reservation_token      TEXT,
            reservation_expires_at INTEGER,
            offline_id             TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_request_queue_order
            ON request_queue(status, created_at, seq);

        CREATE TABLE IF NOT EXISTS request_queue_parts (
            request_id    TEXT NOT NULL REFERENCES request_queue(id) ON DELETE CASCADE,
            position      INTEGER NOT NULL,
            kind          TEXT NOT NULL,
            name          TEXT NOT NULL,
            value         TEXT,
            file_name     TEXT,
            mime_type     TEXT,
            last_modified INTEGER,
            blob          BLOB,
            PRIMARY KEY (request_id, position)
        );
        ",
    )
    .map_err(sqlite_err)?;
    Ok(())
}
