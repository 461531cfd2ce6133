//! Google Calendar REST client

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use slotbot_core::CalendarConfig;
use tracing::{debug, error, info};

use crate::auth::CalendarAuth;
use crate::error::{CalendarError, Result};
use crate::service::{BusyInterval, CalendarService, CreatedEvent, NewEvent};

/// Google Calendar v3 client bound to one calendar
pub struct GoogleCalendarClient {
    client: Client,
    calendar_id: String,
    auth: CalendarAuth,
    base_url: Url,
}

impl GoogleCalendarClient {
    /// Create a new client; every request carries the configured timeout
    pub fn new(config: &CalendarConfig) -> Result<Self> {
        let auth = CalendarAuth::from_config(config)?;
        Self::with_auth(config, auth)
    }

    /// Create a client with an explicit credential
    pub fn with_auth(config: &CalendarConfig, auth: CalendarAuth) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| CalendarError::Configuration(e.to_string()))?;

        let base = config.api_base.trim_end_matches('/');
        let base_url = Url::parse(base)
            .map_err(|e| CalendarError::Configuration(format!("Invalid calendar API base {:?}: {}", base, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(CalendarError::Configuration(format!(
                "Calendar API base cannot be a base URL: {}",
                base
            )));
        }

        info!("Calendar client initialized for calendar: {}", config.calendar_id);

        Ok(Self {
            client,
            calendar_id: config.calendar_id.clone(),
            auth,
            base_url,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CalendarError::Configuration("Calendar API base cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn error_from_response(response: reqwest::Response) -> CalendarError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!("Calendar request failed: {} - {}", status, body);
        CalendarError::Api {
            status: status.as_u16(),
            body,
        }
    }
}

#[async_trait]
impl CalendarService for GoogleCalendarClient {
    async fn query_busy(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<BusyInterval>> {
        let url = self.endpoint(&["freeBusy"])?;
        let body = FreeBusyRequest {
            time_min: start.to_rfc3339_opts(SecondsFormat::Secs, true),
            time_max: end.to_rfc3339_opts(SecondsFormat::Secs, true),
            items: vec![FreeBusyItem {
                id: self.calendar_id.clone(),
            }],
        };

        debug!("Querying free/busy {} .. {}", body.time_min, body.time_max);

        let token = self.auth.bearer_token().await?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let mut parsed: FreeBusyResponse = response.json().await?;
        let calendar = parsed.calendars.remove(&self.calendar_id).ok_or_else(|| {
            CalendarError::ParseError(format!(
                "free/busy response has no entry for {}",
                self.calendar_id
            ))
        })?;

        if let Some(reason) = calendar.errors.first() {
            return Err(CalendarError::CalendarUnavailable {
                calendar_id: self.calendar_id.clone(),
                reason: reason.reason.clone(),
            });
        }

        Ok(calendar.busy)
    }

    async fn insert_event(&self, event: &NewEvent) -> Result<CreatedEvent> {
        let url = self.endpoint(&["calendars", &self.calendar_id, "events"])?;
        let body = EventResource::from(event);

        debug!("Creating event: {}", event.summary);

        let token = self.auth.bearer_token().await?;
        let response = self
            .client
            .post(url)
            .query(&[("sendUpdates", "all")])
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(match Self::error_from_response(response).await {
                CalendarError::Api { status, body } => {
                    CalendarError::CreateError(format!("{} - {}", status, body))
                }
                other => other,
            });
        }

        let created: InsertedEvent = response.json().await?;
        info!("Created event: {}", created.id);

        Ok(CreatedEvent {
            id: created.id,
            html_link: created.html_link,
        })
    }
}

// =============================================================================
// Wire types for the Google Calendar API
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FreeBusyRequest {
    time_min: String,
    time_max: String,
    items: Vec<FreeBusyItem>,
}

#[derive(Debug, Serialize)]
struct FreeBusyItem {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: HashMap<String, FreeBusyCalendar>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyCalendar {
    #[serde(default)]
    busy: Vec<BusyInterval>,
    #[serde(default)]
    errors: Vec<FreeBusyError>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyError {
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventResource {
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    start: EventTime,
    end: EventTime,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: String,
    time_zone: String,
}

impl From<&NewEvent> for EventResource {
    fn from(event: &NewEvent) -> Self {
        Self {
            summary: event.summary.clone(),
            location: event.location.clone(),
            description: event.description.clone(),
            start: EventTime {
                date_time: event.start.to_rfc3339(),
                time_zone: event.time_zone.clone(),
            },
            end: EventTime {
                date_time: event.end.to_rfc3339(),
                time_zone: event.time_zone.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertedEvent {
    id: String,
    #[serde(default)]
    html_link: Option<String>,
}
