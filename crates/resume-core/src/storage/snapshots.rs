//! Snapshot Store - named, timestamped copies of past documents
//!
//! Keyed by file-name-like strings (`backup-<ts>.json`). Writes are upserts:
//! writing an existing name replaces its data and timestamp and never creates
//! a second row. Nothing is cached; every call reads the table.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::Database;
use crate::error::Result;
use crate::versioning::{Clock, SnapshotKind, SystemClock};

/// Snapshot metadata, without the payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    #[serde(rename = "filename")]
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl SnapshotInfo {
    /// Which automatic policy produced this snapshot, if any
    pub fn kind(&self) -> Option<SnapshotKind> {
        SnapshotKind::of_name(&self.name)
    }
}

/// A stored snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub name: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

/// Upsert `data` under `name`
pub fn put(conn: &Connection, name: &str, data: &Value, at: DateTime<Utc>) -> Result<()> {
    let payload = serde_json::to_string(data)?;
    conn.execute(
        "INSERT INTO resume_versions (filename, data, created_at_ms) VALUES (?1, ?2, ?3)
         ON CONFLICT(filename) DO UPDATE SET
             data = excluded.data,
             created_at_ms = excluded.created_at_ms",
        params![name, payload, at.timestamp_millis()],
    )?;
    Ok(())
}

/// Fetch a snapshot by exact name
pub fn get(conn: &Connection, name: &str) -> Result<Option<Snapshot>> {
    let row = conn
        .query_row(
            "SELECT filename, data, created_at_ms FROM resume_versions WHERE filename = ?1",
            params![name],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((name, payload, ms)) => Ok(Some(Snapshot {
            name,
            data: serde_json::from_str(&payload)?,
            created_at: from_millis(ms),
        })),
        None => Ok(None),
    }
}

/// All snapshots, newest first; ties on the timestamp go to the later write
pub fn list(conn: &Connection) -> Result<Vec<SnapshotInfo>> {
    let mut stmt = conn.prepare(
        "SELECT filename, created_at_ms FROM resume_versions
         ORDER BY created_at_ms DESC, id DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(SnapshotInfo {
            name: row.get(0)?,
            created_at: from_millis(row.get(1)?),
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Number of stored snapshots
pub fn count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM resume_versions", [], |row| row.get(0))?)
}

/// Auto-committing access to the snapshot table
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl SnapshotStore {
    pub fn new(db: Database) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn list(&self) -> Result<Vec<SnapshotInfo>> {
        self.db.with_connection(list)
    }

    pub fn get(&self, name: &str) -> Result<Option<Snapshot>> {
        self.db.with_connection(|conn| get(conn, name))
    }

    /// Upsert, timestamped now
    pub fn put(&self, name: &str, data: &Value) -> Result<()> {
        let at = self.clock.now();
        self.db.with_connection(|conn| put(conn, name, data, at))
    }

    pub fn count(&self) -> Result<i64> {
        self.db.with_connection(count)
    }
}
