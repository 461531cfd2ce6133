//! Error types for slotbot-core

use thiserror::Error;

/// Main error type for slotbot-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Result type alias for slotbot-core
pub type Result<T> = std::result::Result<T, Error>;
