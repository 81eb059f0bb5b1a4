//! Error types shared across pgshift crates

use thiserror::Error;

/// Result type alias for pgshift operations
pub type Result<T> = std::result::Result<T, ShiftError>;

/// Errors that are not tied to a particular migration stage
#[derive(Error, Debug)]
pub enum ShiftError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShiftError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
