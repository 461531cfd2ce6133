//! Session persistence using SQLite

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::Result;
use crate::session::SessionRow;

/// SQLite-based session store
///
/// One row per user id. Every method is a single statement, so each upsert
/// or delete is atomic on its own.
pub struct SessionStore {
    conn: Connection,
}

impl SessionStore {
    /// Open (or create) the session database at the given path
    pub fn new(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.init_tables()?;
        Ok(store)
    }

    /// Create an in-memory session store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_tables()?;
        Ok(store)
    }

    /// Initialize database tables
    fn init_tables(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS pending_sessions (
                user_id TEXT PRIMARY KEY,
                slot TEXT NOT NULL,
                contact_name TEXT,
                note TEXT,
                step TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_pending_sessions_expires_at
             ON pending_sessions(expires_at)",
            [],
        )?;

        Ok(())
    }

    /// Insert or fully replace the row for `row.user_id`
    pub fn upsert(&self, row: &SessionRow) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO pending_sessions
                (user_id, slot, contact_name, note, step, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.user_id,
                row.slot,
                row.contact_name,
                row.note,
                row.step,
                row.expires_at.timestamp_millis(),
                row.created_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    /// Set note, step and expiry on an existing row; returns affected row count
    pub fn update_note(
        &self,
        user_id: &str,
        note: &str,
        step: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<usize> {
        let affected = self.conn.execute(
            "UPDATE pending_sessions SET note = ?2, step = ?3, expires_at = ?4
             WHERE user_id = ?1",
            params![user_id, note, step, expires_at.timestamp_millis()],
        )?;
        Ok(affected)
    }

    /// Load the row for a user
    pub fn load(&self, user_id: &str) -> Result<Option<SessionRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT user_id, slot, contact_name, note, step, expires_at, created_at
                 FROM pending_sessions WHERE user_id = ?1",
                params![user_id],
                map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Delete the row for a user; returns affected row count
    pub fn delete(&self, user_id: &str) -> Result<usize> {
        let affected = self.conn.execute(
            "DELETE FROM pending_sessions WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(affected)
    }

    /// Delete every row whose expiry is at or before `now`
    pub fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let affected = self.conn.execute(
            "DELETE FROM pending_sessions WHERE expires_at <= ?1",
            params![now.timestamp_millis()],
        )?;
        Ok(affected)
    }

    /// Count stored rows, expired or not
    pub fn count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM pending_sessions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Readiness check: the sessions table answers a query
    pub fn ping(&self) -> Result<()> {
        self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM pending_sessions)",
            [],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(())
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        user_id: row.get(0)?,
        slot: row.get(1)?,
        contact_name: row.get(2)?,
        note: row.get(3)?,
        step: row.get(4)?,
        expires_at: millis_to_utc(row.get(5)?)?,
        created_at: millis_to_utc(row.get(6)?)?,
    })
}

fn millis_to_utc(millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or(rusqlite::Error::IntegralValueOutOfRange(5, millis))
}
