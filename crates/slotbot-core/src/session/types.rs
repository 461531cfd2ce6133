//! Session types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Where a conversant is in the booking dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStep {
    /// A slot was picked; waiting for an optional note
    AwaitingNote,
    /// The note is in; waiting for confirm or cancel
    AwaitingConfirm,
}

impl SessionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingNote => "awaiting_note",
            Self::AwaitingConfirm => "awaiting_confirm",
        }
    }
}

impl fmt::Display for SessionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting_note" => Ok(Self::AwaitingNote),
            "awaiting_confirm" => Ok(Self::AwaitingConfirm),
            other => Err(format!("unknown session step: {}", other)),
        }
    }
}

/// One conversant's in-flight booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSession {
    /// Conversant identifier (phone number)
    pub user_id: String,
    /// Candidate appointment start, offset preserved
    pub slot: DateTime<FixedOffset>,
    /// Display name captured when the slot was picked
    pub contact_name: Option<String>,
    /// Free-text note, absent until the note step
    pub note: Option<String>,
    pub step: SessionStep,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Stored shape of a session, one row per user
///
/// The slot and step stay as text so a damaged row can still be read and
/// cleared instead of failing the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRow {
    pub user_id: String,
    pub slot: String,
    pub contact_name: Option<String>,
    pub note: Option<String>,
    pub step: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<&PendingSession> for SessionRow {
    fn from(session: &PendingSession) -> Self {
        Self {
            user_id: session.user_id.clone(),
            slot: session.slot.to_rfc3339(),
            contact_name: session.contact_name.clone(),
            note: session.note.clone(),
            step: session.step.as_str().to_string(),
            expires_at: session.expires_at,
            created_at: session.created_at,
        }
    }
}

impl TryFrom<SessionRow> for PendingSession {
    type Error = String;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let slot = DateTime::parse_from_rfc3339(&row.slot)
            .map_err(|e| format!("invalid slot {:?}: {}", row.slot, e))?;
        let step = row.step.parse()?;
        Ok(Self {
            user_id: row.user_id,
            slot,
            contact_name: row.contact_name,
            note: row.note,
            step,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

/// Exact slot identity: same instant and same UTC offset
///
/// `DateTime` equality only compares instants, so `10:00+02:00` and
/// `08:00+00:00` would otherwise match.
pub fn same_slot(a: &DateTime<FixedOffset>, b: &DateTime<FixedOffset>) -> bool {
    a == b && a.offset() == b.offset()
}
