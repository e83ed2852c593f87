//! Naming and triggering rules for automatic snapshots
//!
//! Names are `<prefix>-<timestamp>.json` where the timestamp is ISO-8601 UTC
//! with millisecond precision and every `:` and `.` replaced by `-`, e.g.
//! `backup-2024-05-01T09-30-00-000Z.json`. Two snapshots of the same kind
//! taken within the same millisecond share a name and the later one wins
//! (upsert).

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::ResumeError;
use crate::storage::{snapshots, Database};

/// Source of the current time
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock under caller control: returns the current instant, then moves
/// forward by `step`
///
/// With a zero step it is a fixed clock, which is how same-instant name
/// collisions are reproduced.
#[derive(Debug)]
pub struct ManualClock {
    now: parking_lot::Mutex<DateTime<Utc>>,
    step: chrono::Duration,
}

impl ManualClock {
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::stepping(at, chrono::Duration::zero())
    }

    pub fn stepping(start: DateTime<Utc>, step: chrono::Duration) -> Self {
        Self {
            now: parking_lot::Mutex::new(start),
            step,
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let mut now = self.now.lock();
        let current = *now;
        *now += self.step;
        current
    }
}

/// Why a snapshot was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
    /// Routine pre-write backup before `replace`/`patch`
    Backup,
    /// Backup of the live document immediately before a restore
    PreRestore,
    /// Best-effort backup after a mutation failed
    Emergency,
}

impl SnapshotKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            SnapshotKind::Backup => "backup",
            SnapshotKind::PreRestore => "pre-restore",
            SnapshotKind::Emergency => "emergency-backup",
        }
    }

    /// Classify an existing snapshot name, if it follows the naming scheme
    pub fn of_name(name: &str) -> Option<Self> {
        [SnapshotKind::Emergency, SnapshotKind::PreRestore, SnapshotKind::Backup]
            .into_iter()
            .find(|kind| {
                name.strip_prefix(kind.prefix())
                    .map_or(false, |rest| rest.starts_with('-') && rest.ends_with(".json"))
            })
    }
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Key-safe timestamp: `2024-05-01T09:30:00.000Z` becomes `2024-05-01T09-30-00-000Z`
pub fn timestamp_token(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// Snapshot name for `kind` taken at `at`
pub fn snapshot_name(kind: SnapshotKind, at: DateTime<Utc>) -> String {
    format!("{}-{}.json", kind.prefix(), timestamp_token(at))
}

/// A snapshot name together with the instant it was derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStamp {
    pub name: String,
    pub taken_at: DateTime<Utc>,
}

/// Produces snapshot names from a shared clock
#[derive(Debug, Clone)]
pub struct VersioningPolicy {
    clock: Arc<dyn Clock>,
}

impl Default for VersioningPolicy {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl VersioningPolicy {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Name a snapshot of `kind` taken now
    pub fn stamp(&self, kind: SnapshotKind) -> SnapshotStamp {
        let taken_at = self.clock.now();
        SnapshotStamp {
            name: snapshot_name(kind, taken_at),
            taken_at,
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Best-effort snapshot of `document` after `cause` aborted a mutation
    ///
    /// Runs in its own auto-committed statement, outside the failed
    /// transaction. A failure here is logged and swallowed so the caller can
    /// still surface `cause`. Returns the snapshot name when it was written.
    pub fn emergency_backup(
        &self,
        db: &Database,
        document: &Value,
        cause: &ResumeError,
    ) -> Option<String> {
        let stamp = self.stamp(SnapshotKind::Emergency);
        let written = db.with_connection(|conn| {
            snapshots::put(conn, &stamp.name, document, stamp.taken_at)
        });

        match written {
            Ok(()) => {
                tracing::warn!(snapshot = %stamp.name, error = %cause, "Emergency backup created");
                Some(stamp.name)
            }
            Err(backup_err) => {
                tracing::error!(
                    snapshot = %stamp.name,
                    error = %backup_err,
                    cause = %cause,
                    "Failed to create emergency backup"
                );
                None
            }
        }
    }
}
