//! Shared data model for the forge PoW marketplace chain.
//!
//! Provides the wire/storage types (`Block`, `Transaction`), canonical
//! serialization, PoW difficulty helpers, configuration, and the crate-local
//! error type that every other crate in the workspace builds on.

pub mod block;
pub mod canonical;
pub mod config;
pub mod error;
pub mod pow;

pub use block::{Block, Transaction};
pub use error::{Error, Result};

use chrono::Utc;

/// Returns the current UTC time as an ISO-8601 string, the format used for
/// every `timestamp` field on the wire (SPEC_FULL.md §3).
pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

/// Generates a fresh random UUID as a string, used for `node_id`/`miner_id`.
pub fn new_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}
