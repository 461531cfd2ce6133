//! Availability planning
//!
//! Walks business hours in the configured timezone and asks the calendar
//! whether each candidate slot is free, stopping as soon as enough free
//! slots have been found.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use slotbot_core::{Clock, ScheduleConfig};
use tracing::{debug, info};

use crate::error::Result;
use crate::service::CalendarService;

/// Finds free appointment slots against a calendar
#[derive(Clone)]
pub struct AvailabilityPlanner {
    calendar: Arc<dyn CalendarService>,
    clock: Arc<dyn Clock>,
}

impl AvailabilityPlanner {
    pub fn new(calendar: Arc<dyn CalendarService>, clock: Arc<dyn Clock>) -> Self {
        Self { calendar, clock }
    }

    /// Whether `[start, start + duration_minutes)` has no busy overlap
    ///
    /// Provider failures are returned as errors, never as "busy".
    pub async fn is_slot_free(&self, start: DateTime<FixedOffset>, duration_minutes: u32) -> Result<bool> {
        let start = start.with_timezone(&Utc);
        let end = start + Duration::minutes(i64::from(duration_minutes));

        let busy = self.calendar.query_busy(start, end).await?;
        Ok(!busy.iter().any(|interval| interval.overlaps(start, end)))
    }

    /// The earliest free slots within the lookahead window, oldest first
    pub async fn find_next_slots(&self, schedule: &ScheduleConfig) -> Result<Vec<DateTime<FixedOffset>>> {
        let tz = schedule.timezone;
        let floor = self.clock.now() + Duration::minutes(i64::from(schedule.min_lead_minutes));
        let today = self.clock.now().with_timezone(&tz).date_naive();

        let day_start = schedule.work_start_hour * 60;
        let day_end = schedule.work_end_hour * 60;
        let step = schedule.slot_minutes.max(1);

        let mut slots = Vec::new();
        if schedule.max_slots == 0 {
            return Ok(slots);
        }

        for offset in 0..schedule.lookahead_days {
            let Some(day) = today.checked_add_days(Days::new(u64::from(offset))) else {
                break;
            };
            if schedule.weekend_days.contains(&day.weekday()) {
                continue;
            }

            for minute in (day_start..day_end).step_by(step as usize) {
                let Some(time) = NaiveTime::from_hms_opt(minute / 60, minute % 60, 0) else {
                    continue;
                };
                // Nonexistent local times (DST gap) have no earliest instant
                let Some(local) = tz.from_local_datetime(&day.and_time(time)).earliest() else {
                    debug!("Skipping nonexistent local time {} {}", day, time);
                    continue;
                };
                if local.with_timezone(&Utc) < floor {
                    continue;
                }

                let candidate = local.fixed_offset();
                if self.is_slot_free(candidate, schedule.slot_minutes).await? {
                    slots.push(candidate);
                    if slots.len() >= schedule.max_slots {
                        info!("Found {} free slots", slots.len());
                        return Ok(slots);
                    }
                }
            }
        }

        info!("Found {} free slots", slots.len());
        Ok(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryCalendar;
    use chrono::Weekday;
    use chrono_tz::Asia::Jerusalem;
    use slotbot_core::ManualClock;

    fn planner_at(local: &str) -> (AvailabilityPlanner, Arc<InMemoryCalendar>) {
        let now = DateTime::parse_from_rfc3339(local).unwrap().with_timezone(&Utc);
        let calendar = Arc::new(InMemoryCalendar::new());
        let planner = AvailabilityPlanner::new(calendar.clone(), Arc::new(ManualClock::new(now)));
        (planner, calendar)
    }

    fn schedule(max_slots: usize) -> ScheduleConfig {
        ScheduleConfig {
            timezone: Jerusalem,
            max_slots,
            ..Default::default()
        }
    }

    fn rfc3339(slots: &[DateTime<FixedOffset>]) -> Vec<String> {
        slots.iter().map(|slot| slot.to_rfc3339()).collect()
    }

    #[tokio::test]
    async fn test_respects_lead_time() {
        let (planner, _) = planner_at("2025-01-06T08:45:00+02:00");
        let slots = planner.find_next_slots(&schedule(3)).await.unwrap();
        assert_eq!(
            rfc3339(&slots),
            vec![
                "2025-01-06T10:00:00+02:00",
                "2025-01-06T11:00:00+02:00",
                "2025-01-06T12:00:00+02:00",
            ]
        );
    }

    #[tokio::test]
    async fn test_skips_busy_slots() {
        let (planner, calendar) = planner_at("2025-01-06T08:45:00+02:00");
        calendar
            .add_busy(
                Utc.with_ymd_and_hms(2025, 1, 6, 8, 30, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 1, 6, 9, 30, 0).unwrap(),
            )
            .await;

        let slots = planner.find_next_slots(&schedule(2)).await.unwrap();
        assert_eq!(
            rfc3339(&slots),
            vec!["2025-01-06T12:00:00+02:00", "2025-01-06T13:00:00+02:00"]
        );
    }

    #[tokio::test]
    async fn test_skips_weekend_days() {
        let (planner, _) = planner_at("2025-01-09T16:30:00+02:00");
        let slots = planner.find_next_slots(&schedule(1)).await.unwrap();
        assert_eq!(rfc3339(&slots), vec!["2025-01-12T09:00:00+02:00"]);
        assert_eq!(slots[0].weekday(), Weekday::Sun);
    }

    #[tokio::test]
    async fn test_empty_when_window_exhausted() {
        let (planner, _) = planner_at("2025-01-09T16:30:00+02:00");
        let config = ScheduleConfig {
            lookahead_days: 3,
            ..schedule(3)
        };
        assert!(planner.find_next_slots(&config).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stops_once_enough_slots() {
        let (planner, calendar) = planner_at("2025-01-06T08:45:00+02:00");
        planner.find_next_slots(&schedule(2)).await.unwrap();
        assert_eq!(calendar.query_count(), 2);
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let (planner, calendar) = planner_at("2025-01-06T08:45:00+02:00");
        calendar.set_failing(true);

        assert!(planner.find_next_slots(&schedule(3)).await.is_err());
        let slot = DateTime::parse_from_rfc3339("2025-01-06T10:00:00+02:00").unwrap();
        assert!(planner.is_slot_free(slot, 60).await.is_err());
    }

    #[tokio::test]
    async fn test_is_slot_free_detects_overlap() {
        let (planner, calendar) = planner_at("2025-01-06T08:45:00+02:00");
        calendar
            .add_busy(
                Utc.with_ymd_and_hms(2025, 1, 6, 8, 30, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 1, 6, 8, 45, 0).unwrap(),
            )
            .await;

        let ten = DateTime::parse_from_rfc3339("2025-01-06T10:00:00+02:00").unwrap();
        let eleven = DateTime::parse_from_rfc3339("2025-01-06T11:00:00+02:00").unwrap();
        assert!(!planner.is_slot_free(ten, 60).await.unwrap());
        assert!(planner.is_slot_free(eleven, 60).await.unwrap());
    }
}
