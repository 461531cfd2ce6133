//! Error types for slotbot-calendar

use thiserror::Error;

/// slotbot-calendar error type
#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Calendar credentials not set")]
    CredentialsNotSet,

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Calendar API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Calendar rejected query for {calendar_id}: {reason}")]
    CalendarUnavailable { calendar_id: String, reason: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Create error: {0}")]
    CreateError(String),
}

impl From<reqwest::Error> for CalendarError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CalendarError::ParseError(err.to_string())
        } else {
            CalendarError::Connection(err.to_string())
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CalendarError>;
