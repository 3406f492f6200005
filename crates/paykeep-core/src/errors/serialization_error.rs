/// Errors turning a live request into a durable record (or back).
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("unsupported request body: {kind} cannot be buffered for replay")]
    UnsupportedBody { kind: String },

    #[error("unsupported request method for queueing: {method}")]
    UnsupportedMethod { method: String },

    #[error("invalid JSON body: {reason}")]
    InvalidJson { reason: String },
}
