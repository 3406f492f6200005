/// Errors raised by an `HttpTransport` or by status checks on its responses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {reason}")]
    Network { reason: String },

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },
}

impl TransportError {
    /// Network failures, timeouts, 5xx, 408 and 429 are transient.
    /// Every other 4xx means the request itself is wrong and retrying
    /// it cannot succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network { .. } | TransportError::Timeout { .. } => true,
            TransportError::Server { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            TransportError::InvalidRequest { .. } => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}
