use std::time::Duration;

use paykeep_core::config::*;

#[test]
fn config_loads_from_empty_toml_with_all_defaults() {
    let config = PaykeepConfig::from_toml("").unwrap();

    // Storage defaults
    assert_eq!(config.storage.db_path, "paykeep.db");
    assert_eq!(config.storage.busy_timeout_ms, 5_000);
    assert_eq!(config.storage.read_pool_size, 4);

    // Queue defaults
    assert_eq!(config.queue.max_attempts, 5);
    assert_eq!(config.queue.backoff_base_ms, 5_000);
    assert_eq!(config.queue.backoff_max_ms, 300_000);
    assert_eq!(config.queue.reservation_ttl_secs, 120);

    // Sync defaults
    assert_eq!(config.sync.interval_secs, 300);
    assert_eq!(config.sync.min_interval_secs, 300);
    assert_eq!(config.sync.payments_path, "/payments/list");
    assert_eq!(config.sync.archive_path.as_deref(), Some("/archive"));
    assert_eq!(config.sync.categories_path, "/categories");
    assert_eq!(config.sync.user_path, "/user/profile");

    // Transport defaults
    assert_eq!(config.transport.base_url, "http://localhost:5000/api");
    assert_eq!(config.transport.timeout_secs, 30);
    assert!(config.transport.probe_path.is_none());
    assert!(config.transport.gzip);

    // Observability defaults
    assert_eq!(config.observability.log_level, "info");
    assert!(config.observability.json);
}

#[test]
fn config_loads_partial_toml_with_overrides() {
    let toml = r#"
[storage]
db_path = "/data/paykeep.db"

[queue]
max_attempts = 3

[transport]
base_url = "https://api.example.com"
probe_path = "/health"
"#;
    let config = PaykeepConfig::from_toml(toml).unwrap();
    assert_eq!(config.storage.db_path, "/data/paykeep.db");
    assert_eq!(config.queue.max_attempts, 3);
    assert_eq!(config.transport.base_url, "https://api.example.com");
    assert_eq!(config.transport.probe_path.as_deref(), Some("/health"));
    // Non-overridden fields keep defaults
    assert_eq!(config.storage.read_pool_size, 4);
    assert_eq!(config.queue.backoff_base_ms, 5_000);
}

#[test]
fn config_rejects_zero_max_attempts() {
    let err = PaykeepConfig::from_toml("[queue]\nmax_attempts = 0\n").unwrap_err();
    assert!(err.to_string().contains("max_attempts"));
}

#[test]
fn config_rejects_base_above_cap() {
    let toml = "[queue]\nbackoff_base_ms = 10000\nbackoff_max_ms = 1000\n";
    assert!(PaykeepConfig::from_toml(toml).is_err());
}

#[test]
fn config_rejects_empty_base_url() {
    assert!(PaykeepConfig::from_toml("[transport]\nbase_url = \"  \"\n").is_err());
}

#[test]
fn config_rejects_malformed_toml() {
    let err = PaykeepConfig::from_toml("[queue\nmax_attempts = ").unwrap_err();
    assert!(err.to_string().starts_with("configuration error"));
}

#[test]
fn config_from_file_reports_missing_path() {
    let err = PaykeepConfig::from_file(std::path::Path::new("/nonexistent/paykeep.toml"))
        .unwrap_err();
    assert!(err.to_string().contains("/nonexistent/paykeep.toml"));
}

// ─── Backoff ───

#[test]
fn backoff_doubles_per_attempt() {
    let queue = QueueConfig::default();
    assert_eq!(queue.backoff_delay(0), Duration::from_secs(5));
    assert_eq!(queue.backoff_delay(1), Duration::from_secs(10));
    assert_eq!(queue.backoff_delay(2), Duration::from_secs(20));
    assert_eq!(queue.backoff_delay(3), Duration::from_secs(40));
}

#[test]
fn backoff_is_capped() {
    let queue = QueueConfig::default();
    assert_eq!(queue.backoff_delay(6), Duration::from_secs(300));
    assert_eq!(queue.backoff_delay(63), Duration::from_secs(300));
    assert_eq!(queue.backoff_delay(u32::MAX), Duration::from_secs(300));
}

#[test]
fn defaults_round_trip_through_toml() {
    let config = PaykeepConfig::default();
    let rendered = toml::to_string(&config).unwrap();
    let parsed = PaykeepConfig::from_toml(&rendered).unwrap();
    assert_eq!(parsed.queue.max_attempts, config.queue.max_attempts);
    assert_eq!(parsed.sync.archive_path, config.sync.archive_path);
}

mod prop {
    use paykeep_core::config::QueueConfig;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_backoff_is_monotonic_and_bounded(
            base in 1u64..60_000,
            extra in 0u64..600_000,
            attempts in 0u32..80,
        ) {
            let queue = QueueConfig {
                backoff_base_ms: base,
                backoff_max_ms: base + extra,
                ..QueueConfig::default()
            };
            let current = queue.backoff_delay(attempts);
            let next = queue.backoff_delay(attempts + 1);
            prop_assert!(next >= current);
            prop_assert!(current.as_millis() as u64 <= base + extra);
            prop_assert!(current.as_millis() as u64 >= base);
        }
    }
}
