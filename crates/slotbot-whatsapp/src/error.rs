//! Error types for slotbot-whatsapp

use thiserror::Error;

/// slotbot-whatsapp error type
#[derive(Error, Debug)]
pub enum WhatsAppError {
    #[error("WhatsApp credentials not set")]
    CredentialsNotSet,

    #[error("WhatsApp API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Session error: {0}")]
    Session(#[from] slotbot_core::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WhatsAppError>;
