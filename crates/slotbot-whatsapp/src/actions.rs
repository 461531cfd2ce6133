//! Interactive action identifiers
//!
//! Buttons carry their meaning in the reply id: fixed ids for menu entries
//! and `slot::<timestamp>` / `confirm::<timestamp>` for time-bound actions.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

pub const MENU_BOOK: &str = "menu_book";
pub const MENU_HELP: &str = "menu_help";
pub const CANCEL_FLOW: &str = "cancel_flow";
pub const SLOT_PREFIX: &str = "slot::";
pub const CONFIRM_PREFIX: &str = "confirm::";

const LOCAL_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// A decoded button press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Book,
    Help,
    Cancel,
    SelectSlot(DateTime<FixedOffset>),
    Confirm(DateTime<FixedOffset>),
    /// `slot::` with an unparseable timestamp
    InvalidSlot(String),
    /// `confirm::` with an unparseable timestamp
    InvalidConfirm(String),
    Unknown(String),
}

impl Action {
    /// Decode a reply id; offset-less timestamps are read in `tz`
    pub fn parse(id: &str, tz: Tz) -> Self {
        match id {
            MENU_BOOK => return Action::Book,
            MENU_HELP => return Action::Help,
            CANCEL_FLOW => return Action::Cancel,
            _ => {}
        }

        if let Some(raw) = id.strip_prefix(SLOT_PREFIX) {
            return parse_timestamp(raw, tz)
                .map(Action::SelectSlot)
                .unwrap_or_else(|| Action::InvalidSlot(raw.to_string()));
        }
        if let Some(raw) = id.strip_prefix(CONFIRM_PREFIX) {
            return parse_timestamp(raw, tz)
                .map(Action::Confirm)
                .unwrap_or_else(|| Action::InvalidConfirm(raw.to_string()));
        }

        Action::Unknown(id.to_string())
    }
}

/// Reply id that selects `slot`
pub fn slot_action_id(slot: &DateTime<FixedOffset>) -> String {
    format!("{}{}", SLOT_PREFIX, slot.to_rfc3339())
}

/// Reply id that confirms `slot`
pub fn confirm_action_id(slot: &DateTime<FixedOffset>) -> String {
    format!("{}{}", CONFIRM_PREFIX, slot.to_rfc3339())
}

/// Parse an ISO 8601 timestamp, keeping its offset when it has one
pub fn parse_timestamp(raw: &str, tz: Tz) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed);
    }

    LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|local| local.fixed_offset())
}
