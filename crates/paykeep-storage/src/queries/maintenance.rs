//! Checkpoint and integrity check.

use rusqlite::Connection;

use paykeep_core::errors::PaykeepResult;

use crate::sqlite_err;

/// WAL checkpoint.
pub fn wal_checkpoint(conn: &Connection) -> PaykeepResult<()> {
    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE)")
        .map_err(sqlite_err)?;
    Ok(())
}

/// Run integrity check. Returns the problems found, empty if the database is OK.
pub fn integrity_check(conn: &Connection) -> PaykeepResult<Vec<String>> {
    let mut stmt = conn.prepare("PRAGMA integrity_check").map_err(sqlite_err)?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(sqlite_err)?;

    let mut problems = Vec::new();
    for row in rows {
        let line = row.map_err(sqlite_err)?;
        if line != "ok" {
            problems.push(line);
        }
    }
    Ok(problems)
}
