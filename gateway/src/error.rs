use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("frame too large: {0} bytes (max 65535)")]
    FrameTooLarge(usize),

    #[error("connection closed before a full frame was read")]
    ShortRead,
}

pub type Result<T> = std::result::Result<T, GatewayError>;
