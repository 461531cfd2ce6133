//! Calendar provider port

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A busy period reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Half-open overlap with `[start, end)`
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }
}

/// Event to be inserted into the calendar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    /// IANA name the start and end are expressed in
    pub time_zone: String,
}

/// Reference to an event the provider accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub id: String,
    /// Shareable link, when the provider returns one
    pub html_link: Option<String>,
}

/// Operations the booking flow needs from a calendar provider
///
/// Implementations are bound to a single calendar.
#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Busy intervals intersecting `[start, end)`
    async fn query_busy(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<BusyInterval>>;

    /// Insert an event, asking the provider to notify all attendees
    async fn insert_event(&self, event: &NewEvent) -> Result<CreatedEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_overlap_is_half_open() {
        let at = |h| Utc.with_ymd_and_hms(2025, 1, 6, h, 0, 0).unwrap();
        let busy = BusyInterval::new(at(10), at(11));

        assert!(busy.overlaps(at(10), at(11)));
        assert!(busy.overlaps(at(9), at(12)));
        assert!(!busy.overlaps(at(11), at(12)));
        assert!(!busy.overlaps(at(9), at(10)));
    }
}
