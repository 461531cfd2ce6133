//! slotbot-core: shared foundation for the booking bot
//!
//! Configuration, the error type, the clock abstraction and the durable
//! session store that carries a conversation across webhook deliveries.

pub mod clock;
pub mod config;
pub mod error;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    BotConfig, CalendarConfig, CalendarMode, Config, MAX_BACKOFF_SECONDS, ScheduleConfig, ServerConfig,
    SessionConfig, WhatsAppConfig,
};
pub use error::{Error, Result};
pub use session::{PendingSession, SessionManager, SessionStep, SessionStore, same_slot};
