use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("core error: {0}")]
    Core(#[from] forge_core::Error),

    #[error("key error: {0}")]
    Key(#[from] forge_keys::KeyError),

    #[error("ledger error: {0}")]
    Ledger(#[from] forge_ledger::LedgerError),

    #[error("registry error: {0}")]
    Registry(#[from] rusqlite::Error),

    #[error("frame too large: {0} bytes (max 65535)")]
    FrameTooLarge(usize),

    #[error("connection closed before a full frame was read")]
    ShortRead,
}

pub type Result<T> = std::result::Result<T, NodeError>;
