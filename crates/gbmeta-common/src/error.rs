//! Error types shared across gbmeta crates

use thiserror::Error;

/// Result type alias for gbmeta operations
pub type Result<T> = std::result::Result<T, GbError>;

/// Main error type for gbmeta
#[derive(Error, Debug)]
pub enum GbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GbError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
