//! # paykeep-observability
//!
//! Tracing subscriber setup plus the named events and spans the sync
//! engine emits.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, init_tracing_from_config, init_tracing_with_filter};
