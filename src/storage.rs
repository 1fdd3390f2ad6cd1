//! Local persistence for sessions, events, lab summaries, and delivery
//! routes.
//!
//! Everything lives in one SQLite database, `~/.waybill/waybill.sqlite`.
//! The event tables are append-only and are the single source of truth:
//! session phase markers and point drafts are caches the workflow can
//! rebuild by replaying a session's events.

mod delivery;
mod draft;
mod event;
mod lab;
mod ledger;
mod session;

use std::io;
use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::model::SessionId;

pub use ledger::OrgFlow;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("session already exists: {0}")]
    SessionAlreadyExists(SessionId),

    #[error("an outcome is already recorded for point {point_index} of session {session_id}")]
    DuplicatePointCommit {
        session_id: SessionId,
        point_index: u32,
    },

    #[error("session {0} is already finalized")]
    AlreadyFinalized(SessionId),

    #[error("actor {0} already has an open session")]
    ActorBusy(String),

    #[error("delivery route not found: depot-{0}")]
    DeliveryRouteNotFound(i64),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// SQLite-backed storage for the workflow engine.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Opens (and if necessary creates) the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let storage = Self { conn };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Opens a fresh in-memory database. Used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self { conn };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Returns the default database path: `~/.waybill/waybill.sqlite`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".waybill").join("waybill.sqlite"))
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                 id         TEXT PRIMARY KEY,
                 actor      TEXT NOT NULL,
                 kind       TEXT NOT NULL,
                 label      TEXT NOT NULL,
                 phase      TEXT NOT NULL,
                 created_at TEXT NOT NULL,
                 started_at TEXT
             );

             CREATE TABLE IF NOT EXISTS session_points (
                 session_id  TEXT NOT NULL REFERENCES sessions (id),
                 point_index INTEGER NOT NULL,
                 point       TEXT NOT NULL,
                 PRIMARY KEY (session_id, point_index)
             );

             -- At most one open session per actor, enforced by the
             -- primary key rather than by status scans.
             CREATE TABLE IF NOT EXISTS active_sessions (
                 actor      TEXT PRIMARY KEY,
                 session_id TEXT NOT NULL REFERENCES sessions (id)
             );

             CREATE TABLE IF NOT EXISTS point_events (
                 session_id   TEXT NOT NULL,
                 point_index  INTEGER NOT NULL,
                 organization TEXT NOT NULL,
                 outcome      TEXT NOT NULL,
                 quantity     INTEGER NOT NULL,
                 photos       TEXT NOT NULL,
                 comment      TEXT NOT NULL,
                 recorded_at  TEXT NOT NULL,
                 PRIMARY KEY (session_id, point_index)
             );

             CREATE TABLE IF NOT EXISTS finalizations (
                 session_id  TEXT PRIMARY KEY,
                 kind        TEXT NOT NULL,
                 comment     TEXT,
                 recorded_at TEXT NOT NULL
             );

             CREATE TABLE IF NOT EXISTS lab_summaries (
                 session_id   TEXT NOT NULL,
                 organization TEXT NOT NULL,
                 comment      TEXT,
                 complete     INTEGER NOT NULL DEFAULT 0,
                 PRIMARY KEY (session_id, organization)
             );

             CREATE TABLE IF NOT EXISTS lab_photos (
                 session_id   TEXT NOT NULL,
                 organization TEXT NOT NULL,
                 seq          INTEGER NOT NULL,
                 photo_ref    TEXT NOT NULL,
                 PRIMARY KEY (session_id, organization, seq)
             );

             CREATE TABLE IF NOT EXISTS delivery_routes (
                 id           INTEGER PRIMARY KEY AUTOINCREMENT,
                 status       TEXT NOT NULL,
                 created_by   TEXT NOT NULL,
                 created_at   TEXT NOT NULL,
                 courier      TEXT,
                 completed_at TEXT
             );

             CREATE TABLE IF NOT EXISTS delivery_points (
                 delivery_route_id   INTEGER NOT NULL REFERENCES delivery_routes (id),
                 point_index         INTEGER NOT NULL,
                 organization        TEXT NOT NULL,
                 address             TEXT NOT NULL,
                 quantity_to_deliver INTEGER NOT NULL,
                 quantity_delivered  INTEGER,
                 PRIMARY KEY (delivery_route_id, point_index)
             );

             CREATE TABLE IF NOT EXISTS point_drafts (
                 session_id  TEXT NOT NULL,
                 point_index INTEGER NOT NULL,
                 draft       TEXT NOT NULL,
                 PRIMARY KEY (session_id, point_index)
             );",
        )?;
        Ok(())
    }
}

/// Parses a stored RFC 3339 timestamp column.
fn parse_timestamp(value: &str, column: &str) -> Result<jiff::Timestamp> {
    value
        .parse::<jiff::Timestamp>()
        .map_err(|e| StorageError::Corrupt(format!("invalid {column}: {e}")))
}

/// True when a rusqlite error is a uniqueness/primary-key violation.
fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
