//! SQLite-backed scan store.
//!
//! One table, keyed by `(ip, port, service)`:
//!
//! ```text
//! scans(ip TEXT, port INTEGER, service TEXT,
//!       scanned_at INTEGER, response TEXT, received_at INTEGER)
//! ```
//!
//! The freshness check lives in the upsert statement itself, so a stale
//! write is a no-op inside SQLite rather than a read-compare-write in Rust.

use crate::domain::entities::{ScanKey, ScanRecord};
use crate::domain::errors::StoreError;
use crate::ports::outbound::ScanStore;
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default database location inside the service container.
pub const DEFAULT_DB_PATH: &str = "/data/subscriber.db";

/// Default lock wait before a write reports `Busy`.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(3000);

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS scans (
    ip TEXT NOT NULL,
    port INTEGER NOT NULL,
    service TEXT NOT NULL,
    scanned_at INTEGER NOT NULL,
    response TEXT,
    received_at INTEGER NOT NULL,
    PRIMARY KEY (ip, port, service)
);";

const UPSERT: &str = "INSERT INTO scans (ip, port, service, scanned_at, response, received_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT(ip, port, service) DO UPDATE SET
    scanned_at = excluded.scanned_at,
    response = excluded.response,
    received_at = excluded.received_at
WHERE excluded.scanned_at > scans.scanned_at;";

const SELECT_ONE: &str = "SELECT scanned_at, response, received_at FROM scans
WHERE ip = ?1 AND port = ?2 AND service = ?3;";

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JournalMode {
    /// Write-ahead log; readers do not block the writer.
    #[default]
    Wal,
    /// Rollback journal.
    Delete,
}

impl JournalMode {
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
        }
    }
}

/// Configuration for [`SqliteScanStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub busy_timeout: Duration,
    pub journal_mode: JournalMode,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn with_journal_mode(mut self, journal_mode: JournalMode) -> Self {
        self.journal_mode = journal_mode;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            journal_mode: JournalMode::default(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        let message = err.to_string();
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                Self::Busy { message }
            }
            Some(ErrorCode::ConstraintViolation) => Self::Constraint { message },
            Some(ErrorCode::CannotOpen) | Some(ErrorCode::NotADatabase) => {
                Self::Unavailable { message }
            }
            _ => Self::Io { message },
        }
    }
}

/// Durable scan store over a single SQLite connection.
///
/// The connection mutex is the serialization point for writers in this
/// process. Writers in other processes are handled by SQLite's own locking
/// (waiting up to the busy timeout) plus the single-statement upsert.
pub struct SqliteScanStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteScanStore {
    /// Open (or create) the database described by `config`.
    ///
    /// Creates the parent directory, checks the connection, applies the busy
    /// timeout and journal mode, then ensures the schema exists.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Unavailable {
                message: format!("failed to create db directory {}: {}", parent.display(), e),
            })?;
        }

        let conn = Connection::open(&config.path)?;
        ping(&conn)?;
        apply_pragmas(&conn, config);
        conn.execute_batch(CREATE_TABLE)?;

        info!(path = %config.path.display(), "scan database opened");
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(config.path.clone()),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLE)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn ping(conn: &Connection) -> Result<(), StoreError> {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    Ok(())
}

/// Pragma failures are not fatal; the store still works with SQLite defaults.
fn apply_pragmas(conn: &Connection, config: &StoreConfig) {
    if let Err(e) = conn.busy_timeout(config.busy_timeout) {
        warn!(error = %e, "failed to set busy_timeout");
    }

    match conn.pragma_update_and_check(
        None,
        "journal_mode",
        config.journal_mode.pragma_value(),
        |row| row.get::<_, String>(0),
    ) {
        Ok(mode) => debug!(journal_mode = %mode, "journal mode set"),
        Err(e) => warn!(error = %e, "failed to set journal_mode"),
    }
}

impl ScanStore for SqliteScanStore {
    fn upsert(&self, record: &ScanRecord) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            UPSERT,
            params![
                record.key.ip,
                i64::from(record.key.port),
                record.key.service,
                record.scanned_at,
                record.response,
                record.received_at,
            ],
        )?;
        Ok(rows as u64)
    }

    fn get(&self, key: &ScanKey) -> Result<Option<ScanRecord>, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                SELECT_ONE,
                params![key.ip, i64::from(key.port), key.service],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(scanned_at, response, received_at)| ScanRecord {
            key: key.clone(),
            scanned_at,
            response: response.unwrap_or_default(),
            received_at,
        }))
    }

    fn count(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM scans", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
