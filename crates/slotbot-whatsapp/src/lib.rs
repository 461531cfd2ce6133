//! slotbot-whatsapp: WhatsApp Cloud API front end for the booking bot
//!
//! This crate receives webhook deliveries, runs the booking conversation
//! and sends replies through the Cloud API.

pub mod actions;
pub mod api;
pub mod conversation;
pub mod error;
pub mod notifier;
pub mod types;
pub mod webhook;

#[cfg(test)]
mod testing;

pub use actions::Action;
pub use api::{CloudApiTransport, DeliveryOutcome, MessageTransport};
pub use conversation::{ConversationHandler, Outcome};
pub use error::{Result, WhatsAppError};
pub use notifier::{Notifier, NotifierGateway};
pub use types::{InboundMessage, MessageKind, ReplyOption};
pub use webhook::{AppState, build_router, start_webhook_server};
