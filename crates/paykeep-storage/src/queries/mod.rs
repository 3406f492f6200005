//! SQL for each table group. Every public function that writes more than
//! one statement runs inside a single transaction.

pub mod cache_ops;
pub mod maintenance;
pub mod metadata_ops;
pub mod queue_ops;

use chrono::{DateTime, Utc};
use paykeep_core::errors::PaykeepResult;

use crate::malformed;

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> PaykeepResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| malformed(format!("timestamp out of range: {ms}")))
}

/// Run `f` inside one transaction, committing on `Ok` and rolling back
/// on `Err`.
pub(crate) fn in_transaction<F, T>(conn: &rusqlite::Connection, label: &str, f: F) -> PaykeepResult<T>
where
    F: FnOnce(&rusqlite::Connection) -> PaykeepResult<T>,
{
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| crate::to_storage_err(format!("{label} begin: {e}")))?;

    match f(&tx) {
        Ok(value) => {
            tx.commit().map_err(crate::sqlite_err)?;
            Ok(value)
        }
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}
