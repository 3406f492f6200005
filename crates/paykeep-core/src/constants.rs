/// paykeep version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Header that marks a request as a queue replay. The interceptor never
/// queues a request carrying it.
pub const REPLAY_HEADER: &str = "x-offline-replay";

/// Header set on optimistic responses synthesized while offline.
pub const OFFLINE_RESPONSE_HEADER: &str = "x-offline";

/// Fixed key of the single user profile row.
pub const USER_PROFILE_KEY: &str = "current";

/// Fixed key of the last-sync metadata row.
pub const LAST_SYNC_KEY: &str = "lastSync";

/// Version stamped on exported offline snapshots.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Prefix of provisional payment ids handed out while offline.
pub const OFFLINE_PAYMENT_PREFIX: &str = "payment";

/// Prefix of queued request ids.
pub const QUEUED_REQUEST_PREFIX: &str = "request";
