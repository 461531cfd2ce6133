//! Test doubles shared by the conversation and webhook tests

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use chrono::{TimeZone, Utc};
use slotbot_calendar::{AppointmentBooker, AvailabilityPlanner, InMemoryCalendar};
use slotbot_core::{Config, ManualClock, SessionManager, SessionStore};
use tempfile::TempDir;

use crate::conversation::ConversationHandler;
use crate::notifier::Notifier;
use crate::types::ReplyOption;
use crate::webhook::{AppState, build_router};

/// One recorded outbound message
#[derive(Debug, Clone)]
pub struct Sent {
    pub to: String,
    pub body: String,
    pub options: Vec<ReplyOption>,
}

impl Sent {
    pub fn option_ids(&self) -> Vec<&str> {
        self.options.iter().map(|option| option.id.as_str()).collect()
    }
}

type SendHook = Box<dyn Fn(&Sent) + Send + Sync>;

/// Notifier that remembers everything it was asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
    hook: Mutex<Option<SendHook>>,
}

impl RecordingNotifier {
    /// Run `hook` on every message after it is recorded
    pub fn on_send(&self, hook: impl Fn(&Sent) + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last(&self) -> Sent {
        self.sent.lock().unwrap().last().cloned().expect("nothing was sent")
    }

    fn record(&self, to: &str, body: &str, options: &[ReplyOption]) {
        let sent = Sent {
            to: to.to_string(),
            body: body.to_string(),
            options: options.to_vec(),
        };
        self.sent.lock().unwrap().push(sent.clone());
        if let Some(hook) = self.hook.lock().unwrap().as_ref() {
            hook(&sent);
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, to: &str, body: &str) {
        self.record(to, body, &[]);
    }

    async fn send_options(&self, to: &str, prompt: &str, options: &[ReplyOption]) {
        self.record(to, prompt, options);
    }
}

/// A fully wired handler on Monday 2025-01-06 08:45 Asia/Jerusalem
pub struct Harness {
    pub handler: Arc<ConversationHandler>,
    pub sessions: SessionManager,
    pub calendar: Arc<InMemoryCalendar>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
    pub config: Config,
    db: Option<(TempDir, PathBuf)>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(configure: impl FnOnce(&mut Config)) -> Self {
        Self::build(configure, SessionStore::in_memory().unwrap(), None)
    }

    /// Harness whose session store lives in a file that [`Harness::break_store`] can damage
    pub fn on_disk() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions.db");
        let store = SessionStore::new(path.to_str().unwrap()).unwrap();
        Self::build(|_| {}, store, Some((dir, path)))
    }

    fn build(configure: impl FnOnce(&mut Config), store: SessionStore, db: Option<(TempDir, PathBuf)>) -> Self {
        let mut config = Config::default();
        config.schedule.timezone = chrono_tz::Asia::Jerusalem;
        config.bot.business_name = "Studio Dana".to_string();
        configure(&mut config);

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 6, 6, 45, 0).unwrap(),
        ));
        let sessions = SessionManager::from_store(store, clock.clone(), config.session.ttl());
        let calendar = Arc::new(InMemoryCalendar::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let planner = AvailabilityPlanner::new(calendar.clone(), clock.clone());
        let booker = AppointmentBooker::new(calendar.clone(), &config.calendar, config.schedule.timezone);
        let handler = Arc::new(ConversationHandler::new(
            sessions.clone(),
            planner,
            booker,
            notifier.clone(),
            &config,
        ));

        Self {
            handler,
            sessions,
            calendar,
            notifier,
            clock,
            config,
            db,
        }
    }

    /// Drop the sessions table behind the manager's back
    pub fn break_store(&self) {
        let (_, path) = self.db.as_ref().expect("break_store needs Harness::on_disk");
        break_store_at(path);
    }

    pub fn db_path(&self) -> PathBuf {
        self.db.as_ref().expect("db_path needs Harness::on_disk").1.clone()
    }

    pub fn router(&self) -> Router {
        build_router(AppState {
            handler: self.handler.clone(),
            sessions: self.sessions.clone(),
            verify_token: self.config.whatsapp.verify_token.clone(),
        })
    }
}

/// Drop the sessions table in the database at `path`
pub fn break_store_at(path: &std::path::Path) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch("DROP TABLE pending_sessions").unwrap();
}
