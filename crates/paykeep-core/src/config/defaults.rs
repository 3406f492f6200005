// Single source of truth for all default values.

// --- Storage ---
pub const DEFAULT_DB_FILENAME: &str = "paykeep.db";
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5_000;
pub const DEFAULT_READ_POOL_SIZE: usize = 4;

// --- Queue ---
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 5_000;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 300_000; // 5 minutes
pub const DEFAULT_RESERVATION_TTL_SECS: u64 = 120;

// --- Sync ---
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300; // 5 minutes
pub const DEFAULT_MIN_SYNC_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_PAYMENTS_PATH: &str = "/payments/list";
pub const DEFAULT_ARCHIVE_PATH: &str = "/archive";
pub const DEFAULT_CATEGORIES_PATH: &str = "/categories";
pub const DEFAULT_USER_PATH: &str = "/user/profile";

// --- Transport ---
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_GZIP: bool = true;

// --- Observability ---
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_JSON_LOGS: bool = true;
