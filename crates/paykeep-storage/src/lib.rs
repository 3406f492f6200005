//! # paykeep-storage
//!
//! SQLite persistence: the durable request queue, the read cache of
//! server collections and sync metadata. One write connection behind an
//! async mutex, a pool of read-only connections, versioned migrations.

pub mod engine;
pub mod migrations;
pub mod pool;
pub mod queries;

pub use engine::StorageEngine;

use paykeep_core::errors::{PaykeepError, StorageError};

/// Wrap a message as a generic SQLite storage error.
pub(crate) fn to_storage_err(message: String) -> PaykeepError {
    PaykeepError::StorageError(StorageError::SqliteError { message })
}

/// Classify a rusqlite error. A full disk is a quota problem and a
/// damaged file is corruption; everything else is a plain SQLite failure.
pub(crate) fn sqlite_err(e: rusqlite::Error) -> PaykeepError {
    use rusqlite::ErrorCode;

    let err = match e.sqlite_error_code() {
        Some(ErrorCode::DiskFull) => StorageError::QuotaExceeded {
            details: e.to_string(),
        },
        Some(ErrorCode::DatabaseCorrupt) | Some(ErrorCode::NotADatabase) => {
            StorageError::CorruptionDetected {
                details: e.to_string(),
            }
        }
        _ => StorageError::SqliteError {
            message: e.to_string(),
        },
    };
    PaykeepError::StorageError(err)
}

/// A stored value that does not decode into its model.
pub(crate) fn malformed(details: impl Into<String>) -> PaykeepError {
    PaykeepError::StorageError(StorageError::MalformedRecord {
        details: details.into(),
    })
}
