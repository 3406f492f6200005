//! # paykeep-core
//!
//! Foundation crate for the paykeep offline sync engine.
//! Defines the queue and cache models, the storage/transport traits,
//! errors, config, and constants. Every other crate in the workspace
//! depends on this.

pub mod config;
pub mod constants;
pub mod errors;
pub mod models;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use config::PaykeepConfig;
pub use errors::{PaykeepError, PaykeepResult};
pub use models::{
    ConnectionStatus, HttpMethod, HttpRequest, HttpResponse, QueueEntryStatus, QueueStats,
    QueuedRequest, RequestBody, SerializedBody,
};
