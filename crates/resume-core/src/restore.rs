//! Restore Engine - replay a snapshot into the current document
//!
//! ```text
//! Idle → Validating ─(invalid)→ Failed
//!            │
//!            ▼
//!   BackingUpCurrent + Applying   (one transaction)
//!            │            └─(storage error)→ Failed + emergency backup
//!            ▼
//!          Done
//! ```

use serde_json::Value;

use crate::document::DocumentStore;
use crate::error::{ResumeError, Result};
use crate::resume::Resume;
use crate::schema::{self, FieldIssue};
use crate::storage::{current, snapshots, Database};
use crate::versioning::{SnapshotKind, VersioningPolicy};

/// Progress of one restore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePhase {
    Idle,
    Validating,
    /// Pre-restore backup and apply, committed together
    Applying,
    Done,
    Failed,
}

/// A completed restore
#[derive(Debug, Clone, PartialEq)]
pub struct Restored {
    pub document: Resume,
    /// Name of the `pre-restore-*` snapshot holding the replaced document
    pub pre_restore: String,
}

#[derive(Debug, Clone)]
pub struct RestoreEngine {
    db: Database,
    policy: VersioningPolicy,
}

impl RestoreEngine {
    pub fn new(db: Database, policy: VersioningPolicy) -> Self {
        Self { db, policy }
    }

    /// Share storage and naming with a document store
    pub fn for_store(store: &DocumentStore) -> Self {
        Self::new(store.database().clone(), store.policy().clone())
    }

    /// Restore snapshot `name` (already sanitized) as the current document
    pub fn restore(&self, name: &str) -> Result<Resume> {
        self.restore_with_backup(name).map(|r| r.document)
    }

    /// [`restore`](Self::restore), also reporting the pre-restore snapshot
    pub fn restore_with_backup(&self, name: &str) -> Result<Restored> {
        let mut phase = RestorePhase::Idle;
        let result = self.run(name, &mut phase);
        match &result {
            Ok(restored) => {
                tracing::info!(
                    snapshot = %name,
                    pre_restore = %restored.pre_restore,
                    "Resume restored"
                );
            }
            Err(e) => {
                tracing::warn!(snapshot = %name, phase = ?phase, error = %e, "Restore failed");
            }
        }
        result
    }

    fn run(&self, name: &str, phase: &mut RestorePhase) -> Result<Restored> {
        transition(phase, RestorePhase::Validating, name);
        let snapshot = match self.db.with_connection(|conn| snapshots::get(conn, name)) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                transition(phase, RestorePhase::Failed, name);
                return Err(ResumeError::NotFound(name.to_string()));
            }
            Err(ResumeError::Serialization(e)) => {
                transition(phase, RestorePhase::Failed, name);
                return Err(ResumeError::InvalidSnapshot {
                    name: name.to_string(),
                    issues: vec![FieldIssue::new("", format!("Snapshot data is not valid JSON: {}", e))],
                });
            }
            Err(e) => {
                transition(phase, RestorePhase::Failed, name);
                return Err(e);
            }
        };

        let document = match schema::validate_resume(&snapshot.data) {
            Ok(document) => document,
            Err(issues) => {
                transition(phase, RestorePhase::Failed, name);
                return Err(ResumeError::InvalidSnapshot {
                    name: name.to_string(),
                    issues,
                });
            }
        };

        // Only used if the transaction below fails
        let previous = match self.db.with_connection(current::load) {
            Ok(previous) => previous,
            Err(e) => {
                transition(phase, RestorePhase::Failed, name);
                return Err(e);
            }
        };

        transition(phase, RestorePhase::Applying, name);
        match self.apply(&snapshot.data) {
            Ok(pre_restore) => {
                transition(phase, RestorePhase::Done, name);
                Ok(Restored {
                    document,
                    pre_restore,
                })
            }
            Err(e) => {
                transition(phase, RestorePhase::Failed, name);
                self.policy.emergency_backup(&self.db, &previous, &e);
                Err(e)
            }
        }
    }

    /// Back up the live document and apply `data`, atomically
    fn apply(&self, data: &Value) -> Result<String> {
        self.db.write(|tx| {
            let live = current::load(tx)?;
            let stamp = self.policy.stamp(SnapshotKind::PreRestore);
            snapshots::put(tx, &stamp.name, &live, stamp.taken_at)?;
            current::store(tx, data, stamp.taken_at)?;
            Ok(stamp.name)
        })
    }
}

fn transition(phase: &mut RestorePhase, next: RestorePhase, name: &str) {
    tracing::debug!(snapshot = %name, from = ?*phase, to = ?next, "Restore phase");
    *phase = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SnapshotStore;
    use crate::versioning::ManualClock;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;

    struct Fixture {
        docs: DocumentStore,
        snaps: SnapshotStore,
        engine: RestoreEngine,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let clock = Arc::new(ManualClock::stepping(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            chrono::Duration::seconds(1),
        ));
        let docs = DocumentStore::new(db.clone(), VersioningPolicy::new(clock.clone()));
        let engine = RestoreEngine::for_store(&docs);
        Fixture {
            docs,
            snaps: SnapshotStore::with_clock(db, clock),
            engine,
        }
    }

    fn resume(value: Value) -> Resume {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_restore_missing_is_not_found() {
        let f = fixture();
        f.docs.replace(&resume(json!({"name": "Ada"}))).unwrap();
        let before = f.snaps.count().unwrap();

        let err = f.engine.restore("backup-missing.json").unwrap_err();
        assert!(matches!(err, ResumeError::NotFound(ref n) if n == "backup-missing.json"));
        assert_eq!(f.docs.read_raw().unwrap(), json!({"name": "Ada"}));
        assert_eq!(f.snaps.count().unwrap(), before);
    }

    #[test]
    fn test_restore_invalid_snapshot_is_rejected() {
        let f = fixture();
        f.docs.replace(&resume(json!({"name": "Ada"}))).unwrap();
        f.snaps
            .put("manual.json", &json!({"email": "nope", "skills": "x"}))
            .unwrap();

        let err = f.engine.restore("manual.json").unwrap_err();
        match err {
            ResumeError::InvalidSnapshot { name, issues } => {
                assert_eq!(name, "manual.json");
                assert_eq!(issues.len(), 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(f.docs.read_raw().unwrap(), json!({"name": "Ada"}));
    }

    #[test]
    fn test_restore_unparseable_snapshot_is_invalid() {
        let f = fixture();
        f.docs
            .database()
            .with_connection(|conn| {
                conn.execute(
                    "INSERT INTO resume_versions (filename, data, created_at_ms) VALUES ('bad.json', '{oops', 0)",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let err = f.engine.restore("bad.json").unwrap_err();
        assert!(matches!(err, ResumeError::InvalidSnapshot { .. }));
    }

    #[test]
    fn test_restore_applies_and_backs_up_current() {
        let f = fixture();
        let first = f.docs.replace_committed(&resume(json!({"name": "Ada"}))).unwrap();
        f.docs.patch(&resume(json!({"summary": "Engineer"}))).unwrap();

        let restored = f.engine.restore_with_backup(&first.backup).unwrap();

        assert_eq!(restored.document, Resume::empty());
        assert_eq!(f.docs.read_raw().unwrap(), json!({}));
        assert!(restored.pre_restore.starts_with("pre-restore-"));
        let backup = f.snaps.get(&restored.pre_restore).unwrap().unwrap();
        assert_eq!(backup.data, json!({"name": "Ada", "summary": "Engineer"}));
    }

    #[test]
    fn test_failed_apply_takes_emergency_backup() {
        let f = fixture();
        f.docs.replace(&resume(json!({"name": "Ada"}))).unwrap();
        f.snaps.put("manual.json", &json!({"name": "Old"})).unwrap();
        f.docs
            .database()
            .with_connection(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER block_resume BEFORE UPDATE ON resumes
                     BEGIN SELECT RAISE(ABORT, 'simulated write failure'); END;",
                )?;
                Ok(())
            })
            .unwrap();

        let err = f.engine.restore("manual.json").unwrap_err();
        assert!(err.is_storage_failure());
        assert_eq!(f.docs.read_raw().unwrap(), json!({"name": "Ada"}));

        let listed = f.snaps.list().unwrap();
        assert!(listed.iter().all(|s| !s.name.starts_with("pre-restore-")));
        let emergency = listed
            .iter()
            .find(|s| s.name.starts_with("emergency-backup-"))
            .expect("emergency backup should exist");
        let data = f.snaps.get(&emergency.name).unwrap().unwrap().data;
        assert_eq!(data, json!({"name": "Ada"}));
    }
}
