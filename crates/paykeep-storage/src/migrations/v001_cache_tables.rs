//! v001: read cache (payments, categories, user_profile) and metadata.

use rusqlite::Connection;

use paykeep_core::errors::PaykeepResult;

use crate::sqlite_err;

pub fn migrate(conn: &Connection) -> PaykeepResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS payments (
            id          TEXT PRIMARY KEY,
            position    INTEGER NOT NULL,
            status      TEXT NOT NULL,
            due_date    TEXT NOT NULL,
            category_id TEXT,
            data        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_payments_status ON payments(status);
        CREATE INDEX IF NOT EXISTS idx_payments_due_date ON payments(due_date);
        CREATE INDEX IF NOT EXISTS idx_payments_category ON payments(category_id);

        CREATE TABLE IF NOT EXISTS categories (
            id       TEXT PRIMARY KEY,
            position INTEGER NOT NULL,
            name     TEXT NOT NULL,
            data     TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_profile (
            key  TEXT PRIMARY KEY,
            data TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );
        ",
    )
    .map_err(sqlite_err)?;
    Ok(())
}
