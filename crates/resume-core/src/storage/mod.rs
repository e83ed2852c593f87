//! Persistent Storage Layer - SQLite WAL
//!
//! One database file holds both the current-document slot and the snapshot
//! table. SQLite runs in WAL mode so readers never block the single writer,
//! and every mutation is a `BEGIN IMMEDIATE` transaction so concurrent writers,
//! in this process or another one sharing the file, are linearized.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  Database                   │
//! ├─────────────────────────────────────────────┤
//! │      resumes         │   resume_versions    │
//! │  (current document)  │  (named snapshots)   │
//! └─────────────────────────────────────────────┘
//!         ↓ WAL mode: concurrent reads, serialized writes
//! ```
//!
//! # Example
//!
//! ```no_run
//! use resume_core::storage::Database;
//!
//! # fn example() -> resume_core::Result<()> {
//! let db = Database::open("resume.db")?;
//! let rows: i64 = db.with_connection(|conn| {
//!     Ok(conn.query_row("SELECT COUNT(*) FROM resume_versions", [], |row| row.get(0))?)
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod current;
pub mod snapshots;

pub use snapshots::{Snapshot, SnapshotInfo, SnapshotStore};

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// How long a writer waits on a lock held by another connection
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the SQLite database
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open (or create) the database file in WAL mode and run migrations
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let db = Self::configure(conn)?;
        tracing::info!(path = %path.display(), "Resume database opened");
        Ok(db)
    }

    /// Private in-memory database, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self> {
        // journal_mode answers with the resulting mode, so it has to be queried
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        tracing::debug!(journal_mode = %mode, "SQLite journal mode");
        conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Idempotent DDL; seeds the current-document slot with `{}`
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "
            -- Current document: the row with the greatest id
            CREATE TABLE IF NOT EXISTS resumes (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                data           TEXT NOT NULL,
                created_at_ms  INTEGER NOT NULL,
                updated_at_ms  INTEGER NOT NULL
            );

            -- Named snapshots (upsert by filename)
            CREATE TABLE IF NOT EXISTS resume_versions (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                filename       TEXT NOT NULL UNIQUE,
                data           TEXT NOT NULL,
                created_at_ms  INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_resume_versions_created
                ON resume_versions(created_at_ms DESC);
            ",
        )?;
        current::seed(&conn, chrono::Utc::now())?;
        Ok(())
    }

    /// Run `f` against the connection outside of any transaction
    ///
    /// Each statement auto-commits. Also the entry point for out-of-band
    /// maintenance such as pruning old snapshots.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` inside one `BEGIN IMMEDIATE` transaction
    ///
    /// Commits when `f` returns `Ok`; any error drops the transaction, which
    /// rolls it back.
    pub fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}
