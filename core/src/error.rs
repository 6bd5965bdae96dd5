//! Error types for the **forge-core** crate.
//!
//! All fallible operations in this crate return [`crate::Result`], a convenient
//! alias for `core::result::Result<T, Error>`. Downstream crates define their own
//! local error enum scoped to their own responsibility (see DESIGN.md) and wrap
//! this one where a core operation can fail inside a larger one.

use thiserror::Error;

/// Core crate error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Canonical payload could not be serialized to JSON.
    #[error("canonical serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Configuration file could not be parsed.
    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// Difficulty value exceeds the length of a SHA-256 hex digest (64 chars).
    #[error("difficulty {0} exceeds hash length")]
    DifficultyOutOfRange(u32),
}

/// Convenient result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
