//! slotbot-calendar: calendar side of the booking bot
//!
//! ## Features
//!
//! - [`CalendarService`] port with a Google Calendar REST client and an
//!   in-memory implementation
//! - [`CalendarAuth`] for service account or static bearer tokens
//! - [`AvailabilityPlanner`] for finding free slots in business hours
//! - [`AppointmentBooker`] for committing confirmed bookings
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use slotbot_calendar::{AvailabilityPlanner, GoogleCalendarClient};
//!
//! let calendar = Arc::new(GoogleCalendarClient::new(&config.calendar)?);
//! let planner = AvailabilityPlanner::new(calendar, Arc::new(SystemClock));
//! let slots = planner.find_next_slots(&config.schedule).await?;
//! ```

pub mod auth;
pub mod booking;
pub mod client;
pub mod error;
pub mod memory;
pub mod planner;
pub mod service;

pub use auth::CalendarAuth;
pub use booking::{AppointmentBooker, AppointmentRequest};
pub use client::GoogleCalendarClient;
pub use error::{CalendarError, Result};
pub use memory::InMemoryCalendar;
pub use planner::AvailabilityPlanner;
pub use service::{BusyInterval, CalendarService, CreatedEvent, NewEvent};
