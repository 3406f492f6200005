//! Versioned schema migrations, recorded in `schema_version`.

pub mod v001_cache_tables;
pub mod v002_request_queue;

use rusqlite::{params, Connection};

use paykeep_core::errors::{PaykeepError, PaykeepResult, StorageError};

type Migration = fn(&Connection) -> PaykeepResult<()>;

const MIGRATIONS: &[(u32, Migration)] = &[
    (1, v001_cache_tables::migrate),
    (2, v002_request_queue::migrate),
];

/// Highest schema version this build knows.
pub const LATEST_VERSION: u32 = 2;

fn migration_err(version: u32, reason: impl ToString) -> PaykeepError {
    PaykeepError::StorageError(StorageError::MigrationFailed {
        version,
        reason: reason.to_string(),
    })
}

/// Run all pending migrations, each in its own transaction.
/// Returns the number applied.
pub fn run_migrations(conn: &Connection) -> PaykeepResult<usize> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        );",
    )
    .map_err(|e| migration_err(0, e))?;

    let current = schema_version(conn)?;
    if current > LATEST_VERSION {
        return Err(migration_err(
            current,
            format!("database schema is newer than this build (latest {LATEST_VERSION})"),
        ));
    }

    let mut applied = 0;
    for (version, migrate) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| migration_err(*version, e))?;
        match migrate(&tx) {
            Ok(()) => {
                tx.execute(
                    "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                    params![version, chrono::Utc::now().timestamp_millis()],
                )
                .map_err(|e| migration_err(*version, e))?;
                tx.commit().map_err(|e| migration_err(*version, e))?;
            }
            Err(e) => {
                let _ = tx.rollback();
                return Err(migration_err(*version, e));
            }
        }
        tracing::info!(version = *version, "applied migration");
        applied += 1;
    }
    Ok(applied)
}

/// Current schema version, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> PaykeepResult<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| migration_err(0, e))
}
