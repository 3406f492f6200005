//! Error taxonomy. Subsystem errors convert into [`PaykeepError`] via `From`.

mod serialization_error;
mod storage_error;
mod transport_error;

pub use serialization_error::SerializationError;
pub use storage_error::StorageError;
pub use transport_error::TransportError;

/// Result alias used across the workspace.
pub type PaykeepResult<T> = Result<T, PaykeepError>;

/// Top-level error for every public paykeep operation.
#[derive(Debug, thiserror::Error)]
pub enum PaykeepError {
    #[error("storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("serialization error: {0}")]
    SerializationError(#[from] SerializationError),

    #[error("transport error: {0}")]
    TransportError(#[from] TransportError),

    #[error("queued request {id} exhausted {attempts} attempts")]
    QueueExhausted { id: String, attempts: u32 },

    #[error("queued request not found: {id}")]
    QueuedRequestNotFound { id: String },

    #[error("sync failed: {reason}")]
    SyncFailed { reason: String },

    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

impl PaykeepError {
    /// Whether a replay failing with this error may succeed on a later attempt.
    ///
    /// Only transport failures are classified; every other error reaching the
    /// replayer is local and would fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            PaykeepError::TransportError(e) => e.is_retryable(),
            _ => false,
        }
    }
}
