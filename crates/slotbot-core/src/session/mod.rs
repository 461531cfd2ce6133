//! Session management module
//!
//! Provides persistence and TTL handling for in-flight booking sessions.

mod manager;
mod store;
mod types;

pub use manager::{DEFAULT_TTL_MINUTES, SessionManager};
pub use store::SessionStore;
pub use types::{PendingSession, SessionRow, SessionStep, same_slot};
