//! Structured log events for queue and sync operations.
//!
//! Each function emits a `tracing` event with an `event` field naming it.

/// A mutation was captured while offline.
pub fn request_queued(request_id: &str, method: &str, url: &str) {
    tracing::info!(
        event = "request_queued",
        request_id = %request_id,
        method = %method,
        url = %url,
        "request queued for replay"
    );
}

/// A queued mutation reached the server.
pub fn replay_delivered(request_id: &str, status: u16, attempts: u32) {
    tracing::info!(
        event = "replay_delivered",
        request_id = %request_id,
        status = status,
        attempts = attempts,
        "queued request delivered"
    );
}

pub fn replay_retry_scheduled(request_id: &str, attempts: u32, delay_ms: u64, reason: &str) {
    tracing::warn!(
        event = "replay_retry_scheduled",
        request_id = %request_id,
        attempts = attempts,
        delay_ms = delay_ms,
        reason = %reason,
        "replay failed, retry scheduled"
    );
}

/// Terminal failure; the entry stays queued as FAILED.
pub fn replay_failed(request_id: &str, attempts: u32, reason: &str) {
    tracing::error!(
        event = "replay_failed",
        request_id = %request_id,
        attempts = attempts,
        reason = %reason,
        "queued request failed permanently"
    );
}

/// A provisional id was replaced by the server's.
pub fn offline_id_resolved(offline_id: &str, server_id: &str, rewritten: usize) {
    tracing::debug!(
        event = "offline_id_resolved",
        offline_id = %offline_id,
        server_id = %server_id,
        rewritten = rewritten,
        "offline id resolved"
    );
}

pub fn drain_completed(delivered: usize, retried: usize, failed: usize, skipped: usize) {
    tracing::info!(
        event = "drain_completed",
        delivered = delivered,
        retried = retried,
        failed = failed,
        skipped = skipped,
        "replay sweep completed"
    );
}

pub fn sync_skipped(reason: &str) {
    tracing::debug!(event = "sync_skipped", reason = %reason, "sync skipped");
}

pub fn sync_completed(payments: usize, categories: usize, duration_ms: u64) {
    tracing::info!(
        event = "sync_completed",
        payments = payments,
        categories = categories,
        duration_ms = duration_ms,
        "full sync completed"
    );
}

/// Some collections could not be pulled.
pub fn sync_partial(failed: &[&str]) {
    tracing::warn!(
        event = "sync_partial",
        failed = ?failed,
        "full sync partially failed"
    );
}

pub fn sync_failed(reason: &str) {
    tracing::error!(event = "sync_failed", reason = %reason, "full sync failed");
}

pub fn connection_changed(from: &str, to: &str) {
    tracing::info!(
        event = "connection_changed",
        from = %from,
        to = %to,
        "connection status changed"
    );
}
