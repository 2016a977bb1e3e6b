//! SQLite storage handle.
//!
//! The triage core keeps all durable state in a single SQLite database. The
//! [`Database`] value wraps one connection behind a mutex and is cloned into
//! every store, so the storage handle is explicitly threaded through the
//! system rather than living in ambient global state.

use crate::error::TriageResult;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Shared handle to the SQLite database.
///
/// Cheap to clone; all clones refer to the same connection. Multi-statement
/// mutations go through [`Database::with_tx`] so they commit or roll back as
/// a unit.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (creating if necessary) the database at `path` and bring the
    /// schema up to date.
    pub fn open(path: &Path) -> TriageResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> TriageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> TriageResult<Self> {
        configure_pragmas(&conn)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a read or single-statement operation against the connection.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, rusqlite::Error> {
        let conn = self.lock();
        f(&conn)
    }

    /// Run `f` inside a transaction, committing on success.
    pub fn with_tx<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, rusqlite::Error>,
    ) -> Result<T, rusqlite::Error> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock only means another thread panicked mid-operation;
        // the connection itself is still usable.
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn configure_pragmas(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch("PRAGMA foreign_keys=ON;")
}

fn run_migrations(conn: &Connection) -> Result<(), rusqlite::Error> {
    let current_version = get_current_version(conn);

    let migrations: [(i64, &str); 1] = [(1, include_str!("../migrations/001_initial.sql"))];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("running schema migration v{version}");
            conn.execute_batch(sql)?;
        }
    }

    Ok(())
}

/// Current schema version, or 0 if no schema exists yet.
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

// ============================================================================
// ROW CONVERSION HELPERS
// ============================================================================

/// Current time truncated to microseconds, the precision the database stores.
pub(crate) fn now() -> DateTime<Utc> {
    let now = Utc::now();
    match DateTime::parse_from_rfc3339(&format_timestamp(&now)) {
        Ok(parsed) => parsed.with_timezone(&Utc),
        Err(_) => now,
    }
}

/// Render a timestamp in the canonical stored form (RFC 3339, microseconds).
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Parse a stored timestamp, reporting a conversion failure against `idx`.
pub(crate) fn parse_timestamp(idx: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse a stored UUID, reporting a conversion failure against `idx`.
pub(crate) fn parse_uuid(idx: usize, raw: &str) -> Result<Uuid, rusqlite::Error> {
    Uuid::parse_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
