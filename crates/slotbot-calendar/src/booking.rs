//! Booking commit

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset};
use chrono_tz::Tz;
use slotbot_core::CalendarConfig;
use tracing::{error, info};

use crate::error::Result;
use crate::service::{CalendarService, CreatedEvent, NewEvent};

/// Everything needed to put one appointment on the calendar
#[derive(Debug, Clone)]
pub struct AppointmentRequest {
    pub slot: DateTime<FixedOffset>,
    pub duration_minutes: u32,
    pub user_id: String,
    pub contact_name: Option<String>,
    pub note: Option<String>,
}

/// Writes confirmed appointments to the calendar
#[derive(Clone)]
pub struct AppointmentBooker {
    calendar: Arc<dyn CalendarService>,
    summary: String,
    location: Option<String>,
    timezone: Tz,
}

impl AppointmentBooker {
    pub fn new(calendar: Arc<dyn CalendarService>, config: &CalendarConfig, timezone: Tz) -> Self {
        Self {
            calendar,
            summary: config.summary.clone(),
            location: config.location.clone(),
            timezone,
        }
    }

    /// Event for a request, expressed in the booking timezone
    pub fn build_event(&self, request: &AppointmentRequest) -> NewEvent {
        let start = request.slot.with_timezone(&self.timezone);
        let end = start + Duration::minutes(i64::from(request.duration_minutes));

        let mut lines = vec![format!("WhatsApp: {}", request.user_id)];
        if let Some(name) = request.contact_name.as_deref().filter(|n| !n.is_empty()) {
            lines.push(format!("Name: {}", name));
        }
        if let Some(note) = request.note.as_deref().filter(|n| !n.is_empty()) {
            lines.push(format!("Notes: {}", note));
        }

        NewEvent {
            summary: self.summary.clone(),
            description: Some(lines.join("\n")),
            location: self.location.clone(),
            start: start.fixed_offset(),
            end: end.fixed_offset(),
            time_zone: self.timezone.name().to_string(),
        }
    }

    /// Insert the appointment; slot freedom is the caller's concern
    pub async fn create_appointment(&self, request: &AppointmentRequest) -> Result<CreatedEvent> {
        let event = self.build_event(request);

        match self.calendar.insert_event(&event).await {
            Ok(created) => {
                info!(
                    "Booked {} for {} (event {})",
                    event.start.to_rfc3339(),
                    request.user_id,
                    created.id
                );
                Ok(created)
            }
            Err(e) => {
                error!("Failed to book {} for {}: {}", event.start, request.user_id, e);
                Err(e)
            }
        }
    }
}
