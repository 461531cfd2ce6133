//! Configuration management
//!
//! Settings are resolved in the following priority order:
//! 1. Environment variables
//! 2. `slotbot.toml` in the working directory
//! 3. Default values
//!
//! `${VAR_NAME}` references inside the TOML file are expanded from the
//! environment before parsing. The resulting [`Config`] is immutable and is
//! handed to each component's constructor.

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::Weekday;
use chrono_tz::Tz;
use serde::Deserialize;

use crate::{Error, Result};

/// Default configuration file name
pub const CONFIG_FILE: &str = "slotbot.toml";

/// Upper bound for the WhatsApp retry backoff unit
pub const MAX_BACKOFF_SECONDS: f64 = 60.0;

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen port for webhook and health endpoints
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8000 }
    }
}

/// Session store configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Path to SQLite database file
    pub db_path: String,
    /// Lifetime of a pending booking session
    pub ttl_minutes: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            db_path: "data/slotbot.db".to_string(),
            ttl_minutes: 30,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.ttl_minutes))
    }
}

/// Business hours and slot planning parameters
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Timezone business hours are expressed in
    pub timezone: Tz,
    /// First slot start hour (24h clock)
    pub work_start_hour: u32,
    /// Hour at which the working day ends; no slot starts at or after it
    pub work_end_hour: u32,
    /// Slot length in minutes
    pub slot_minutes: u32,
    /// Number of calendar days scanned, today included
    pub lookahead_days: u32,
    /// Maximum number of free slots returned by the planner
    pub max_slots: usize,
    /// Days without business hours
    pub weekend_days: Vec<Weekday>,
    /// Minimum distance between "now" and the earliest offered slot
    pub min_lead_minutes: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Asia::Jerusalem,
            work_start_hour: 9,
            work_end_hour: 17,
            slot_minutes: 60,
            lookahead_days: 7,
            max_slots: 6,
            weekend_days: vec![Weekday::Fri, Weekday::Sat],
            min_lead_minutes: 30,
        }
    }
}

/// Where bookings are committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalendarMode {
    /// Google Calendar REST API
    #[default]
    Google,
    /// Process-local calendar; bookings are lost on restart
    Local,
}

impl CalendarMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarMode::Google => "google",
            CalendarMode::Local => "local",
        }
    }
}

impl FromStr for CalendarMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google" => Ok(CalendarMode::Google),
            "local" => Ok(CalendarMode::Local),
            other => Err(format!("unknown calendar mode {:?} (expected google or local)", other)),
        }
    }
}

/// Calendar provider configuration
#[derive(Debug, Clone)]
pub struct CalendarConfig {
    /// Backend used for planning and booking
    pub mode: CalendarMode,
    /// Calendar to plan against and book into
    pub calendar_id: String,
    /// Service account key file; tokens are minted and refreshed from it
    pub service_account_path: Option<String>,
    /// User the service account impersonates (domain-wide delegation)
    pub delegated_user: Option<String>,
    /// Static OAuth bearer token, used when no service account is set
    pub access_token: String,
    /// Calendar REST API base URL
    pub api_base: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Summary used for created events
    pub summary: String,
    /// Optional location set on created events
    pub location: Option<String>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            mode: CalendarMode::default(),
            calendar_id: "primary".to_string(),
            service_account_path: None,
            delegated_user: None,
            access_token: String::new(),
            api_base: "https://www.googleapis.com/calendar/v3".to_string(),
            timeout_secs: 10,
            summary: "Appointment".to_string(),
            location: None,
        }
    }
}

impl CalendarConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// A service account key or a static token is configured
    pub fn has_credentials(&self) -> bool {
        self.service_account_path.is_some() || !self.access_token.is_empty()
    }
}

/// WhatsApp Cloud API configuration
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Bearer token for the Cloud API
    pub access_token: String,
    /// Sending phone number id
    pub phone_number_id: String,
    /// Graph API base URL
    pub api_base: String,
    /// Shared secret echoed back during webhook verification
    pub verify_token: String,
    /// Delivery attempts per outbound message
    pub max_retries: u32,
    /// Linear backoff unit between attempts
    pub backoff_seconds: f64,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            phone_number_id: String::new(),
            api_base: "https://graph.facebook.com/v18.0".to_string(),
            verify_token: "change_me".to_string(),
            max_retries: 3,
            backoff_seconds: 1.5,
            timeout_secs: 10,
        }
    }
}

impl WhatsAppConfig {
    /// Both the token and the phone number id are needed to send anything
    pub fn has_credentials(&self) -> bool {
        !self.access_token.is_empty() && !self.phone_number_id.is_empty()
    }

    /// Backoff unit, clamped to `0..=MAX_BACKOFF_SECONDS`
    pub fn backoff(&self) -> Duration {
        Duration::try_from_secs_f64(self.backoff_seconds.clamp(0.0, MAX_BACKOFF_SECONDS))
            .unwrap_or_default()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Conversation wording and routing
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Name used in greetings
    pub business_name: String,
    /// Recipient of "new booking" notifications
    pub operator_phone: Option<String>,
    /// Lowercase keywords that trigger the menu from free text
    pub booking_keywords: Vec<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            business_name: "our studio".to_string(),
            operator_phone: None,
            booking_keywords: vec![
                "book".to_string(),
                "appointment".to_string(),
                "hair".to_string(),
            ],
        }
    }
}

/// Main configuration for slotbot
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub schedule: ScheduleConfig,
    pub calendar: CalendarConfig,
    pub whatsapp: WhatsAppConfig,
    pub bot: BotConfig,
}

impl Config {
    /// Load configuration from the default file, falling back to the environment
    pub fn load() -> Result<Self> {
        if Path::new(CONFIG_FILE).exists() {
            return Self::from_toml_file(CONFIG_FILE);
        }
        Self::from_env()
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file; environment variables still take precedence
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_toml_str(&content, |key| std::env::var(key).ok())
    }

    /// Parse TOML content, expanding `${VAR}` references through `lookup`
    pub fn from_toml_str<F>(content: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expanded = expand_env_vars(content, &lookup);
        let toml: TomlConfig = toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;

        let mut config = Self::default();
        config.apply_toml(toml)?;
        config.apply_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_toml(&mut self, toml: TomlConfig) -> Result<()> {
        if let Some(server) = toml.server {
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(session) = toml.session {
            if let Some(path) = session.db_path {
                self.session.db_path = path;
            }
            if let Some(ttl) = session.ttl_minutes {
                self.session.ttl_minutes = ttl;
            }
        }

        if let Some(schedule) = toml.schedule {
            if let Some(tz) = schedule.timezone {
                self.schedule.timezone = parse_value("schedule.timezone", &tz)?;
            }
            if let Some(hour) = schedule.work_start_hour {
                self.schedule.work_start_hour = hour;
            }
            if let Some(hour) = schedule.work_end_hour {
                self.schedule.work_end_hour = hour;
            }
            if let Some(minutes) = schedule.slot_minutes {
                self.schedule.slot_minutes = minutes;
            }
            if let Some(days) = schedule.lookahead_days {
                self.schedule.lookahead_days = days;
            }
            if let Some(max) = schedule.max_slots {
                self.schedule.max_slots = max;
            }
            if let Some(days) = schedule.weekend_days {
                self.schedule.weekend_days = days
                    .iter()
                    .map(|day| parse_value("schedule.weekend_days", day))
                    .collect::<Result<_>>()?;
            }
            if let Some(lead) = schedule.min_lead_minutes {
                self.schedule.min_lead_minutes = lead;
            }
        }

        if let Some(calendar) = toml.calendar {
            if let Some(mode) = calendar.mode {
                self.calendar.mode = parse_value("calendar.mode", &mode)?;
            }
            if let Some(id) = calendar.calendar_id {
                self.calendar.calendar_id = id;
            }
            if calendar.service_account_path.is_some() {
                self.calendar.service_account_path = calendar.service_account_path;
            }
            if calendar.delegated_user.is_some() {
                self.calendar.delegated_user = calendar.delegated_user;
            }
            if let Some(token) = calendar.access_token {
                self.calendar.access_token = token;
            }
            if let Some(base) = calendar.api_base {
                self.calendar.api_base = base;
            }
            if let Some(timeout) = calendar.timeout_secs {
                self.calendar.timeout_secs = timeout;
            }
            if let Some(summary) = calendar.summary {
                self.calendar.summary = summary;
            }
            if calendar.location.is_some() {
                self.calendar.location = calendar.location;
            }
        }

        if let Some(whatsapp) = toml.whatsapp {
            if let Some(token) = whatsapp.access_token {
                self.whatsapp.access_token = token;
            }
            if let Some(id) = whatsapp.phone_number_id {
                self.whatsapp.phone_number_id = id;
            }
            if let Some(base) = whatsapp.api_base {
                self.whatsapp.api_base = base;
            }
            if let Some(token) = whatsapp.verify_token {
                self.whatsapp.verify_token = token;
            }
            if let Some(retries) = whatsapp.max_retries {
                self.whatsapp.max_retries = retries;
            }
            if let Some(backoff) = whatsapp.backoff_seconds {
                self.whatsapp.backoff_seconds = backoff;
            }
            if let Some(timeout) = whatsapp.timeout_secs {
                self.whatsapp.timeout_secs = timeout;
            }
        }

        if let Some(bot) = toml.bot {
            if let Some(name) = bot.business_name {
                self.bot.business_name = name;
            }
            if bot.operator_phone.is_some() {
                self.bot.operator_phone = bot.operator_phone;
            }
            if let Some(keywords) = bot.booking_keywords {
                self.bot.booking_keywords =
                    keywords.into_iter().map(|k| k.to_lowercase()).collect();
            }
        }

        Ok(())
    }

    /// Override settings with whatever the lookup provides
    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Server
        if let Some(port) = get("PORT") {
            self.server.port = parse_value("PORT", &port)?;
        }

        // Session
        if let Some(path) = get("DB_PATH") {
            self.session.db_path = path;
        }
        if let Some(ttl) = get("SESSION_TTL_MINUTES") {
            self.session.ttl_minutes = parse_value("SESSION_TTL_MINUTES", &ttl)?;
        }

        // Schedule
        if let Some(tz) = get("TZ") {
            self.schedule.timezone = parse_value("TZ", &tz)?;
        }
        if let Some(hour) = get("WORK_START_HOUR") {
            self.schedule.work_start_hour = parse_value("WORK_START_HOUR", &hour)?;
        }
        if let Some(hour) = get("WORK_END_HOUR") {
            self.schedule.work_end_hour = parse_value("WORK_END_HOUR", &hour)?;
        }
        if let Some(minutes) = get("SLOT_MINUTES") {
            self.schedule.slot_minutes = parse_value("SLOT_MINUTES", &minutes)?;
        }
        if let Some(days) = get("LOOKAHEAD_DAYS") {
            self.schedule.lookahead_days = parse_value("LOOKAHEAD_DAYS", &days)?;
        }
        if let Some(max) = get("MAX_SLOTS") {
            self.schedule.max_slots = parse_value("MAX_SLOTS", &max)?;
        }
        if let Some(days) = get("WEEKEND_DAYS") {
            self.schedule.weekend_days = split_list(&days)
                .iter()
                .map(|day| parse_value("WEEKEND_DAYS", day))
                .collect::<Result<_>>()?;
        }
        if let Some(lead) = get("MIN_LEAD_MINUTES") {
            self.schedule.min_lead_minutes = parse_value("MIN_LEAD_MINUTES", &lead)?;
        }

        // Calendar
        if let Some(mode) = get("CALENDAR_MODE") {
            self.calendar.mode = parse_value("CALENDAR_MODE", &mode)?;
        }
        if let Some(id) = get("CALENDAR_ID") {
            self.calendar.calendar_id = id;
        }
        if let Some(path) = get("SA_CREDS_PATH") {
            self.calendar.service_account_path = Some(path);
        }
        if let Some(user) = get("CALENDAR_DELEGATED_USER") {
            self.calendar.delegated_user = Some(user);
        }
        if let Some(token) = get("CALENDAR_ACCESS_TOKEN") {
            self.calendar.access_token = token;
        }
        if let Some(base) = get("CALENDAR_API_BASE") {
            self.calendar.api_base = base;
        }
        if let Some(timeout) = get("CALENDAR_TIMEOUT_SECS") {
            self.calendar.timeout_secs = parse_value("CALENDAR_TIMEOUT_SECS", &timeout)?;
        }
        if let Some(summary) = get("APPOINTMENT_SUMMARY") {
            self.calendar.summary = summary;
        }
        if let Some(location) = get("APPOINTMENT_LOCATION") {
            self.calendar.location = Some(location);
        }

        // WhatsApp
        if let Some(token) = get("WA_TOKEN") {
            self.whatsapp.access_token = token;
        }
        if let Some(id) = get("PHONE_ID") {
            self.whatsapp.phone_number_id = id;
        }
        if let Some(base) = get("WA_API_BASE") {
            self.whatsapp.api_base = base;
        }
        if let Some(token) = get("VERIFY_TOKEN") {
            self.whatsapp.verify_token = token;
        }
        if let Some(retries) = get("WA_MAX_RETRIES") {
            self.whatsapp.max_retries = parse_value("WA_MAX_RETRIES", &retries)?;
        }
        if let Some(backoff) = get("WA_BACKOFF_SECONDS") {
            self.whatsapp.backoff_seconds = parse_value("WA_BACKOFF_SECONDS", &backoff)?;
        }
        if let Some(timeout) = get("WHATSAPP_TIMEOUT_SECS") {
            self.whatsapp.timeout_secs = parse_value("WHATSAPP_TIMEOUT_SECS", &timeout)?;
        }

        // Bot
        if let Some(name) = get("BUSINESS_NAME") {
            self.bot.business_name = name;
        }
        if let Some(phone) = get("OPERATOR_PHONE") {
            self.bot.operator_phone = Some(phone);
        }
        if let Some(keywords) = get("BOOKING_KEYWORDS") {
            self.bot.booking_keywords = split_list(&keywords)
                .into_iter()
                .map(|k| k.to_lowercase())
                .collect();
        }

        Ok(())
    }

    /// Reject values the planner and notifier cannot work with
    pub fn validate(&self) -> Result<()> {
        let schedule = &self.schedule;
        if schedule.work_end_hour > 24 {
            return Err(Error::Config(format!(
                "WORK_END_HOUR must be at most 24, got {}",
                schedule.work_end_hour
            )));
        }
        if schedule.work_start_hour >= schedule.work_end_hour {
            return Err(Error::Config(format!(
                "WORK_START_HOUR ({}) must be before WORK_END_HOUR ({})",
                schedule.work_start_hour, schedule.work_end_hour
            )));
        }
        if schedule.slot_minutes == 0 {
            return Err(Error::Config("SLOT_MINUTES must be positive".to_string()));
        }
        if schedule.max_slots == 0 {
            return Err(Error::Config("MAX_SLOTS must be positive".to_string()));
        }
        if self.session.ttl_minutes == 0 {
            return Err(Error::Config(
                "SESSION_TTL_MINUTES must be positive".to_string(),
            ));
        }
        if self.whatsapp.max_retries == 0 {
            return Err(Error::Config("WA_MAX_RETRIES must be at least 1".to_string()));
        }
        if self.calendar.mode == CalendarMode::Google && !self.calendar.has_credentials() {
            return Err(Error::Config(
                "Calendar credentials missing: set SA_CREDS_PATH or CALENDAR_ACCESS_TOKEN \
                 (or CALENDAR_MODE=local for a process-local calendar)"
                    .to_string(),
            ));
        }
        if !(0.0..=MAX_BACKOFF_SECONDS).contains(&self.whatsapp.backoff_seconds) {
            return Err(Error::Config(format!(
                "WA_BACKOFF_SECONDS must be between 0 and {}, got {}",
                MAX_BACKOFF_SECONDS, self.whatsapp.backoff_seconds
            )));
        }
        Ok(())
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {:?} ({})", key, raw, e)))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Replace `${VAR_NAME}` with the looked-up value; unknown variables become empty
fn expand_env_vars<F>(value: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }

            if let Some(env_value) = lookup(&var_name) {
                result.push_str(&env_value);
            }
        } else {
            result.push(c);
        }
    }

    result
}

// ============================================================================
// TOML file structure
// ============================================================================

#[derive(Debug, Deserialize, Default)]
struct TomlConfig {
    server: Option<TomlServerConfig>,
    session: Option<TomlSessionConfig>,
    schedule: Option<TomlScheduleConfig>,
    calendar: Option<TomlCalendarConfig>,
    whatsapp: Option<TomlWhatsAppConfig>,
    bot: Option<TomlBotConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlServerConfig {
    port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlSessionConfig {
    db_path: Option<String>,
    ttl_minutes: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlScheduleConfig {
    timezone: Option<String>,
    work_start_hour: Option<u32>,
    work_end_hour: Option<u32>,
    slot_minutes: Option<u32>,
    lookahead_days: Option<u32>,
    max_slots: Option<usize>,
    weekend_days: Option<Vec<String>>,
    min_lead_minutes: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlCalendarConfig {
    mode: Option<String>,
    calendar_id: Option<String>,
    service_account_path: Option<String>,
    delegated_user: Option<String>,
    access_token: Option<String>,
    api_base: Option<String>,
    timeout_secs: Option<u64>,
    summary: Option<String>,
    location: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlWhatsAppConfig {
    access_token: Option<String>,
    phone_number_id: Option<String>,
    api_base: Option<String>,
    verify_token: Option<String>,
    max_retries: Option<u32>,
    backoff_seconds: Option<f64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlBotConfig {
    business_name: Option<String>,
    operator_phone: Option<String>,
    booking_keywords: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[("CALENDAR_ACCESS_TOKEN", "token")])).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.session.ttl_minutes, 30);
        assert_eq!(config.schedule.timezone, chrono_tz::Asia::Jerusalem);
        assert_eq!(config.schedule.weekend_days, vec![Weekday::Fri, Weekday::Sat]);
        assert_eq!(config.schedule.min_lead_minutes, 30);
        assert_eq!(config.calendar.mode, CalendarMode::Google);
        assert_eq!(config.calendar.calendar_id, "primary");
        assert!(config.calendar.service_account_path.is_none());
        assert_eq!(config.whatsapp.max_retries, 3);
        assert!(!config.whatsapp.has_credentials());
        assert!(config.bot.operator_phone.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("CALENDAR_MODE", "local"),
            ("TZ", "Europe/London"),
            ("WORK_START_HOUR", "10"),
            ("WORK_END_HOUR", "18"),
            ("SLOT_MINUTES", "45"),
            ("WEEKEND_DAYS", "sat, sun"),
            ("WA_TOKEN", "token"),
            ("PHONE_ID", "12345"),
            ("WA_BACKOFF_SECONDS", "0.5"),
            ("OPERATOR_PHONE", "+972500000000"),
            ("BOOKING_KEYWORDS", "Book, Slot"),
        ]))
        .unwrap();

        assert_eq!(config.schedule.timezone, chrono_tz::Europe::London);
        assert_eq!(config.schedule.work_start_hour, 10);
        assert_eq!(config.schedule.work_end_hour, 18);
        assert_eq!(config.schedule.slot_minutes, 45);
        assert_eq!(config.schedule.weekend_days, vec![Weekday::Sat, Weekday::Sun]);
        assert!(config.whatsapp.has_credentials());
        assert_eq!(config.whatsapp.backoff(), Duration::from_millis(500));
        assert_eq!(config.bot.operator_phone.as_deref(), Some("+972500000000"));
        assert_eq!(config.bot.booking_keywords, vec!["book", "slot"]);
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let config = Config::from_lookup(lookup_from(&[
            ("CALENDAR_MODE", "local"),
            ("TZ", ""),
            ("OPERATOR_PHONE", "  "),
        ]))
        .unwrap();
        assert_eq!(config.schedule.timezone, chrono_tz::Asia::Jerusalem);
        assert!(config.bot.operator_phone.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = Config::from_lookup(lookup_from(&[("TZ", "Mars/Olympus")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_lookup(lookup_from(&[("SLOT_MINUTES", "soon")])).unwrap_err();
        assert!(err.to_string().contains("SLOT_MINUTES"));

        let err = Config::from_lookup(lookup_from(&[
            ("WORK_START_HOUR", "17"),
            ("WORK_END_HOUR", "9"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("WORK_START_HOUR"));

        let err = Config::from_lookup(lookup_from(&[("CALENDAR_MODE", "local"), ("SLOT_MINUTES", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("SLOT_MINUTES"));
        let err = Config::from_lookup(lookup_from(&[("CALENDAR_MODE", "local"), ("WA_MAX_RETRIES", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("WA_MAX_RETRIES"));
        let err = Config::from_lookup(lookup_from(&[("CALENDAR_MODE", "remote")])).unwrap_err();
        assert!(err.to_string().contains("CALENDAR_MODE"));
    }

    #[test]
    fn test_backoff_is_bounded() {
        for raw in ["1e30", "61", "-1", "NaN", "inf"] {
            let err = Config::from_lookup(lookup_from(&[
                ("CALENDAR_MODE", "local"),
                ("WA_TOKEN", "t"),
                ("PHONE_ID", "1"),
                ("WA_BACKOFF_SECONDS", raw),
            ]))
            .unwrap_err();
            assert!(err.to_string().contains("WA_BACKOFF_SECONDS"), "{}: {}", raw, err);
        }

        let config = Config::from_lookup(lookup_from(&[
            ("CALENDAR_MODE", "local"),
            ("WA_BACKOFF_SECONDS", "60"),
        ]))
        .unwrap();
        assert_eq!(config.whatsapp.backoff(), Duration::from_secs(60));

        // Values set in code bypass validation but still never panic
        let whatsapp = WhatsAppConfig {
            backoff_seconds: 1e30,
            ..Default::default()
        };
        assert_eq!(whatsapp.backoff(), Duration::from_secs(60));
        let whatsapp = WhatsAppConfig {
            backoff_seconds: f64::NAN,
            ..Default::default()
        };
        assert_eq!(whatsapp.backoff(), Duration::ZERO);
    }

    #[test]
    fn test_calendar_credentials_required() {
        let err = Config::from_lookup(|_| None).unwrap_err();
        assert!(err.to_string().contains("CALENDAR_MODE=local"));

        let config = Config::from_lookup(lookup_from(&[("CALENDAR_MODE", "Local")])).unwrap();
        assert_eq!(config.calendar.mode, CalendarMode::Local);
        assert!(!config.calendar.has_credentials());

        let config = Config::from_lookup(lookup_from(&[
            ("SA_CREDS_PATH", "/etc/slotbot/sa.json"),
            ("CALENDAR_DELEGATED_USER", "owner@example.com"),
        ]))
        .unwrap();
        assert_eq!(config.calendar.mode, CalendarMode::Google);
        assert_eq!(config.calendar.service_account_path.as_deref(), Some("/etc/slotbot/sa.json"));
        assert_eq!(config.calendar.delegated_user.as_deref(), Some("owner@example.com"));
        assert!(config.calendar.has_credentials());
    }

    #[test]
    fn test_expand_env_vars() {
        let lookup = lookup_from(&[("SLOTBOT_TEST_VAR", "test_value")]);

        let result = expand_env_vars("prefix_${SLOTBOT_TEST_VAR}_suffix", &lookup);
        assert_eq!(result, "prefix_test_value_suffix");

        let result = expand_env_vars("prefix_${NONEXISTENT_VAR}_suffix", &lookup);
        assert_eq!(result, "prefix__suffix");

        assert_eq!(expand_env_vars("no_vars_here", &lookup), "no_vars_here");
        assert_eq!(expand_env_vars("${}_content", &lookup), "_content");
    }

    #[test]
    fn test_toml_config_parsing() {
        let toml_content = r#"
[server]
port = 8080

[session]
db_path = "/tmp/sessions.db"
ttl_minutes = 15

[schedule]
timezone = "America/New_York"
work_start_hour = 8
work_end_hour = 12
slot_minutes = 30
weekend_days = ["sat", "sun"]

[calendar]
mode = "google"
calendar_id = "salon@example.com"
delegated_user = "owner@example.com"
access_token = "${CAL_TOKEN}"
location = "Main street 1"

[whatsapp]
verify_token = "secret"
max_retries = 5

[bot]
business_name = "Studio Dana"
operator_phone = "+15550000"
"#;

        let config = Config::from_toml_str(
            toml_content,
            lookup_from(&[("CAL_TOKEN", "abc"), ("PORT", "9090")]),
        )
        .unwrap();

        // Environment wins over the file
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.session.db_path, "/tmp/sessions.db");
        assert_eq!(config.session.ttl(), chrono::Duration::minutes(15));
        assert_eq!(config.schedule.timezone, chrono_tz::America::New_York);
        assert_eq!(config.schedule.work_end_hour, 12);
        assert_eq!(config.schedule.weekend_days, vec![Weekday::Sat, Weekday::Sun]);
        assert_eq!(config.calendar.calendar_id, "salon@example.com");
        assert_eq!(config.calendar.access_token, "abc");
        assert_eq!(config.calendar.delegated_user.as_deref(), Some("owner@example.com"));
        assert_eq!(config.calendar.location.as_deref(), Some("Main street 1"));
        assert_eq!(config.whatsapp.verify_token, "secret");
        assert_eq!(config.whatsapp.max_retries, 5);
        assert_eq!(config.bot.business_name, "Studio Dana");
    }

    #[test]
    fn test_toml_parse_error() {
        let err = Config::from_toml_str("[server\nport = 1", |_| None).unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML"));
    }
}
