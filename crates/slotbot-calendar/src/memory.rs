//! In-process calendar
//!
//! Keeps busy intervals and created events in memory. Used when no calendar
//! token is configured and as the calendar double in tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{CalendarError, Result};
use crate::service::{BusyInterval, CalendarService, CreatedEvent, NewEvent};

/// Calendar held entirely in memory
#[derive(Default)]
pub struct InMemoryCalendar {
    busy: RwLock<Vec<BusyInterval>>,
    events: RwLock<Vec<(CreatedEvent, NewEvent)>>,
    failing: AtomicBool,
    queries: AtomicUsize,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `[start, end)` as busy
    pub async fn add_busy(&self, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.busy.write().await.push(BusyInterval::new(start, end));
    }

    /// Events created so far, oldest first
    pub async fn events(&self) -> Vec<(CreatedEvent, NewEvent)> {
        self.events.read().await.clone()
    }

    /// Make every call fail with a connection error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of busy queries served
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn check_failing(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CalendarError::Connection(
                "calendar marked as failing".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CalendarService for InMemoryCalendar {
    async fn query_busy(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<BusyInterval>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;

        let busy = self.busy.read().await;
        Ok(busy
            .iter()
            .filter(|interval| interval.overlaps(start, end))
            .cloned()
            .collect())
    }

    async fn insert_event(&self, event: &NewEvent) -> Result<CreatedEvent> {
        self.check_failing()?;

        let mut events = self.events.write().await;
        let created = CreatedEvent {
            id: format!("local-{}", events.len() + 1),
            html_link: None,
        };
        events.push((created.clone(), event.clone()));
        drop(events);

        self.add_busy(event.start.with_timezone(&Utc), event.end.with_timezone(&Utc))
            .await;

        info!("Recorded local event {} at {}", created.id, event.start);
        debug!("Local event summary: {}", event.summary);
        Ok(created)
    }
}
