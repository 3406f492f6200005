use paykeep_core::errors::*;

#[test]
fn queue_exhausted_carries_id_and_attempts() {
    let err = PaykeepError::QueueExhausted {
        id: "request-42".into(),
        attempts: 5,
    };
    let msg = err.to_string();
    assert!(msg.contains("request-42"));
    assert!(msg.contains('5'));
}

#[test]
fn storage_error_converts_into_paykeep_error() {
    let err: PaykeepError = StorageError::QuotaExceeded {
        details: "database or disk is full".into(),
    }
    .into();
    assert!(matches!(err, PaykeepError::StorageError(_)));
    assert!(err.to_string().contains("quota"));
}

#[test]
fn network_and_timeout_are_retryable() {
    assert!(TransportError::Network {
        reason: "connection refused".into()
    }
    .is_retryable());
    assert!(TransportError::Timeout { timeout_ms: 30_000 }.is_retryable());
}

#[test]
fn server_errors_classify_by_status() {
    let server = |status| TransportError::Server {
        status,
        message: String::new(),
    };
    for status in [500, 502, 503, 504, 408, 429] {
        assert!(server(status).is_retryable(), "{status} should be retryable");
    }
    for status in [400, 401, 403, 404, 409, 422] {
        assert!(!server(status).is_retryable(), "{status} should be terminal");
    }
}

#[test]
fn only_transport_errors_are_retryable_at_top_level() {
    let transient: PaykeepError = TransportError::Timeout { timeout_ms: 1 }.into();
    assert!(transient.is_retryable());

    let local: PaykeepError = SerializationError::UnsupportedBody {
        kind: "stream".into(),
    }
    .into();
    assert!(!local.is_retryable());
    assert!(!PaykeepError::SyncFailed {
        reason: "x".into()
    }
    .is_retryable());
}

#[test]
fn transport_error_exposes_status() {
    let err = TransportError::Server {
        status: 503,
        message: "unavailable".into(),
    };
    assert_eq!(err.status(), Some(503));
    assert_eq!(
        TransportError::Network {
            reason: "down".into()
        }
        .status(),
        None
    );
}
