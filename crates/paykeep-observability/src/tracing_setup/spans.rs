//! Span definitions per operation: drain, replay, sync.

/// Create a replay sweep span.
#[macro_export]
macro_rules! drain_span {
    ($sweep_id:expr) => {
        tracing::info_span!("paykeep.drain", sweep_id = $sweep_id)
    };
}

/// Create a span around one replayed request.
#[macro_export]
macro_rules! replay_span {
    ($request_id:expr, $method:expr) => {
        tracing::debug_span!("paykeep.replay", request_id = %$request_id, method = %$method)
    };
}

/// Create a full sync span.
#[macro_export]
macro_rules! sync_span {
    ($forced:expr) => {
        tracing::info_span!("paykeep.sync", forced = $forced)
    };
}

/// Span names as constants for programmatic use.
pub mod names {
    pub const DRAIN: &str = "paykeep.drain";
    pub const REPLAY: &str = "paykeep.replay";
    pub const SYNC: &str = "paykeep.sync";
}
