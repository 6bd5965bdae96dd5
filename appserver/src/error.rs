//! Crate-local error type for the app server's tx pipeline (SPEC_FULL.md §4.6 / C6).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("wallet store error: {0}")]
    Wallet(#[from] forge_wallet_store::WalletError),

    #[error("tls error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("certificate generation error: {0}")]
    CertGen(String),

    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("connection closed mid-frame")]
    ShortRead,
}

pub type Result<T> = std::result::Result<T, PipelineError>;
