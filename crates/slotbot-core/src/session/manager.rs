//! Session management
//!
//! [`SessionManager`] is the async face of the session store. Expired
//! sessions are swept lazily whenever a session is read, and rows that no
//! longer parse are treated as corrupt: they are deleted and reported as
//! absent.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, FixedOffset};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::session::{PendingSession, SessionRow, SessionStep, SessionStore};
use crate::{Error, Result};

/// Default lifetime of a pending session
pub const DEFAULT_TTL_MINUTES: i64 = 30;

/// Session manager that handles pending booking lifecycle
#[derive(Clone)]
pub struct SessionManager {
    /// Persistent storage (wrapped in Mutex for thread safety)
    store: Arc<Mutex<SessionStore>>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl SessionManager {
    /// Create a session manager backed by a database file
    pub fn new(db_path: &str) -> Result<Self> {
        Self::with_options(
            db_path,
            Arc::new(SystemClock),
            Duration::minutes(DEFAULT_TTL_MINUTES),
        )
    }

    /// Create a session manager with a custom clock and TTL
    pub fn with_options(db_path: &str, clock: Arc<dyn Clock>, default_ttl: Duration) -> Result<Self> {
        let store = SessionStore::new(db_path)?;
        Ok(Self::from_store(store, clock, default_ttl))
    }

    /// Create an in-memory session manager (for testing)
    pub fn in_memory(clock: Arc<dyn Clock>) -> Result<Self> {
        let store = SessionStore::in_memory()?;
        Ok(Self::from_store(
            store,
            clock,
            Duration::minutes(DEFAULT_TTL_MINUTES),
        ))
    }

    pub fn from_store(store: SessionStore, clock: Arc<dyn Clock>, default_ttl: Duration) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            clock,
            default_ttl,
        }
    }

    /// TTL applied when callers do not pass one
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Run a store operation on the blocking pool
    async fn with_store<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&SessionStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let guard = store
                .lock()
                .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
            op(&*guard)
        })
        .await
        .map_err(|e| Error::StoreUnavailable(e.to_string()))?
    }

    /// Start (or restart) a booking for a user with the picked slot
    ///
    /// Any previous session for the user is overwritten.
    pub async fn set_pending_slot(
        &self,
        user_id: &str,
        slot: DateTime<FixedOffset>,
        contact_name: Option<&str>,
        ttl: Option<Duration>,
    ) -> Result<PendingSession> {
        let now = self.clock.now();
        let session = PendingSession {
            user_id: user_id.to_string(),
            slot,
            contact_name: contact_name.map(str::to_string),
            note: None,
            step: SessionStep::AwaitingNote,
            expires_at: now + ttl.unwrap_or(self.default_ttl),
            created_at: now,
        };

        let row = SessionRow::from(&session);
        self.with_store(move |store| store.upsert(&row)).await?;

        info!("Pending slot {} set for {}", session.slot.to_rfc3339(), user_id);
        Ok(session)
    }

    /// Record the note and move the session to `AwaitingConfirm`
    ///
    /// Returns `None` when there is no live session, which callers treat as
    /// "expired, restart the flow".
    pub async fn set_note(
        &self,
        user_id: &str,
        note: &str,
        ttl: Option<Duration>,
    ) -> Result<Option<PendingSession>> {
        let now = self.clock.now();
        let expires_at = now + ttl.unwrap_or(self.default_ttl);
        let user = user_id.to_string();
        let note = note.to_string();

        let row = self
            .with_store(move |store| {
                store.delete_expired(now)?;
                let updated = store.update_note(
                    &user,
                    &note,
                    SessionStep::AwaitingConfirm.as_str(),
                    expires_at,
                )?;
                if updated == 0 {
                    return Ok(None);
                }
                store.load(&user)
            })
            .await?;

        match row {
            Some(row) => Ok(self.parse_or_clear(row).await?),
            None => {
                debug!("No pending session to attach a note to for {}", user_id);
                Ok(None)
            }
        }
    }

    /// Fetch the live session for a user, sweeping expired sessions first
    pub async fn get_pending(&self, user_id: &str) -> Result<Option<PendingSession>> {
        let now = self.clock.now();
        let user = user_id.to_string();

        let row = self
            .with_store(move |store| {
                let swept = store.delete_expired(now)?;
                if swept > 0 {
                    debug!("Swept {} expired sessions", swept);
                }
                store.load(&user)
            })
            .await?;

        match row {
            Some(row) => self.parse_or_clear(row).await,
            None => Ok(None),
        }
    }

    /// Delete the session for a user; a no-op when there is none
    pub async fn clear(&self, user_id: &str) -> Result<()> {
        let user = user_id.to_string();
        let removed = self.with_store(move |store| store.delete(&user)).await?;
        if removed > 0 {
            info!("Cleared pending session for {}", user_id);
        }
        Ok(())
    }

    /// Readiness check: one small query against the sessions table
    pub async fn check_ready(&self) -> Result<()> {
        self.with_store(|store| store.ping()).await
    }

    async fn parse_or_clear(&self, row: SessionRow) -> Result<Option<PendingSession>> {
        let user_id = row.user_id.clone();
        match PendingSession::try_from(row) {
            Ok(session) => Ok(Some(session)),
            Err(reason) => {
                warn!("Discarding corrupt session for {}: {}", user_id, reason);
                self.clear(&user_id).await?;
                Ok(None)
            }
        }
    }

    /// Insert a raw row, bypassing validation (for testing corruption handling)
    #[cfg(test)]
    async fn insert_raw(&self, row: SessionRow) -> Result<()> {
        self.with_store(move |store| store.upsert(&row)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    fn setup() -> (SessionManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 7, 0, 0).unwrap(),
        ));
        let manager = SessionManager::in_memory(clock.clone()).unwrap();
        (manager, clock)
    }

    fn slot(value: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(value).unwrap()
    }

    #[tokio::test]
    async fn test_set_and_expire() {
        let (manager, clock) = setup();
        manager
            .set_pending_slot(
                "123",
                slot("2025-01-01T09:00:00+02:00"),
                Some("Alice"),
                Some(Duration::minutes(1)),
            )
            .await
            .unwrap();

        let pending = manager.get_pending("123").await.unwrap().unwrap();
        assert_eq!(pending.contact_name.as_deref(), Some("Alice"));
        assert_eq!(pending.step, SessionStep::AwaitingNote);

        clock.advance(Duration::minutes(1));
        assert!(manager.get_pending("123").await.unwrap().is_none());

        // The sweep removed the row, so going back in time does not revive it
        clock.advance(Duration::minutes(-1));
        assert!(manager.get_pending("123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_round_trip_keeps_exact_slot() {
        let (manager, _) = setup();
        let picked = slot("2025-01-01T10:00:00+02:00");
        manager.set_pending_slot("123", picked, None, None).await.unwrap();

        let pending = manager.get_pending("123").await.unwrap().unwrap();
        assert_eq!(pending.slot, picked);
        assert_eq!(pending.slot.offset(), picked.offset());
        assert_eq!(pending.slot.to_rfc3339(), "2025-01-01T10:00:00+02:00");
    }

    #[tokio::test]
    async fn test_note_advances_step() {
        let (manager, clock) = setup();
        manager
            .set_pending_slot("555", slot("2025-01-01T11:00:00+02:00"), None, None)
            .await
            .unwrap();

        clock.advance(Duration::minutes(20));
        let updated = manager.set_note("555", "bring color", None).await.unwrap().unwrap();
        assert_eq!(updated.note.as_deref(), Some("bring color"));
        assert_eq!(updated.step, SessionStep::AwaitingConfirm);
        assert_eq!(updated.expires_at, clock.now() + manager.default_ttl());

        // The refreshed expiry outlives the original one
        clock.advance(Duration::minutes(20));
        assert!(manager.get_pending("555").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_skip_note_is_stored_empty() {
        let (manager, _) = setup();
        manager
            .set_pending_slot("555", slot("2025-01-01T11:00:00+02:00"), None, None)
            .await
            .unwrap();

        let updated = manager.set_note("555", "", None).await.unwrap().unwrap();
        assert_eq!(updated.note.as_deref(), Some(""));
        assert_eq!(updated.step, SessionStep::AwaitingConfirm);
    }

    #[tokio::test]
    async fn test_note_without_session() {
        let (manager, clock) = setup();
        assert!(manager.set_note("nobody", "hi", None).await.unwrap().is_none());

        manager
            .set_pending_slot(
                "123",
                slot("2025-01-01T11:00:00+02:00"),
                None,
                Some(Duration::minutes(1)),
            )
            .await
            .unwrap();
        clock.advance(Duration::minutes(5));
        assert!(manager.set_note("123", "late", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_new_slot_overwrites_session() {
        let (manager, _) = setup();
        manager
            .set_pending_slot("123", slot("2025-01-01T10:00:00+02:00"), Some("Alice"), None)
            .await
            .unwrap();
        manager.set_note("123", "first", None).await.unwrap();

        let second = slot("2025-01-02T12:00:00+02:00");
        manager.set_pending_slot("123", second, Some("Alice"), None).await.unwrap();

        let pending = manager.get_pending("123").await.unwrap().unwrap();
        assert_eq!(pending.slot, second);
        assert_eq!(pending.step, SessionStep::AwaitingNote);
        assert!(pending.note.is_none());
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let (manager, _) = setup();
        manager
            .set_pending_slot("123", slot("2025-01-01T10:00:00+02:00"), None, None)
            .await
            .unwrap();

        manager.clear("123").await.unwrap();
        manager.clear("123").await.unwrap();
        assert!(manager.get_pending("123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_slot_is_cleared() {
        let (manager, clock) = setup();
        manager
            .insert_raw(SessionRow {
                user_id: "123".to_string(),
                slot: "not-a-timestamp".to_string(),
                contact_name: None,
                note: None,
                step: "awaiting_note".to_string(),
                expires_at: clock.now() + Duration::minutes(10),
                created_at: clock.now(),
            })
            .await
            .unwrap();

        assert!(manager.get_pending("123").await.unwrap().is_none());
        let remaining = manager.with_store(|store| store.count()).await.unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_check_ready() {
        let (manager, _) = setup();
        assert!(manager.check_ready().await.is_ok());
    }
}
