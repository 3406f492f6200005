//! Shared test doubles and payload builders for the paykeep workspace.
//!
//! - [`MockTransport`]: scripted `HttpTransport` with a request log.
//! - [`ManualClock`]: a clock tests move by hand.
//! - [`RecordingToastSink`]: collects toasts for assertions.
//! - builders and JSON fixtures under `data/`.

pub mod builders;
mod clock;
mod mock_transport;
mod toast;

pub use clock::ManualClock;
pub use mock_transport::{Gate, MockReply, MockTransport, RecordedBody, RecordedRequest};
pub use toast::RecordingToastSink;

use serde::de::DeserializeOwned;
use std::path::PathBuf;

/// Root directory of the fixture JSON files.
fn fixtures_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data")
}

/// Load and deserialize a JSON fixture file.
///
/// # Panics
/// Panics if the file doesn't exist or can't be deserialized.
pub fn load_fixture<T: DeserializeOwned>(relative_path: &str) -> T {
    let path = fixtures_root().join(relative_path);
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", path.display(), e))
}

/// Load a fixture file as raw JSON Value.
pub fn load_fixture_value(relative_path: &str) -> serde_json::Value {
    load_fixture(relative_path)
}
