//! Document Store - the single current resume
//!
//! Every mutation runs read → snapshot → write inside one immediate
//! transaction, so the pre-mutation document is always captured and either
//! both writes land or neither does. Failures surface to the caller unchanged;
//! deciding whether to take an emergency backup is the caller's job.

use serde_json::Value;

use crate::error::{ResumeError, Result};
use crate::resume::Resume;
use crate::schema;
use crate::storage::{current, snapshots, Database};
use crate::versioning::{SnapshotKind, VersioningPolicy};

/// Outcome of a mutation: the new document and the backup taken before it
#[derive(Debug, Clone, PartialEq)]
pub struct Committed {
    pub document: Resume,
    pub backup: String,
}

#[derive(Debug, Clone)]
pub struct DocumentStore {
    db: Database,
    policy: VersioningPolicy,
}

impl DocumentStore {
    pub fn new(db: Database, policy: VersioningPolicy) -> Self {
        Self { db, policy }
    }

    /// Current document, typed; `{}` if the slot is uninitialized
    pub fn read(&self) -> Result<Resume> {
        let raw = self.read_raw()?;
        Ok(serde_json::from_value(raw)?)
    }

    /// Current document exactly as stored
    pub fn read_raw(&self) -> Result<Value> {
        self.db.with_connection(current::load)
    }

    /// Replace the whole document
    pub fn replace(&self, document: &Resume) -> Result<Resume> {
        self.replace_committed(document).map(|c| c.document)
    }

    /// [`replace`](Self::replace), also reporting the backup name
    pub fn replace_committed(&self, document: &Resume) -> Result<Committed> {
        let next = document.to_value()?;
        let committed = self.db.write(|tx| {
            let previous = current::load(tx)?;
            let stamp = self.policy.stamp(SnapshotKind::Backup);
            snapshots::put(tx, &stamp.name, &previous, stamp.taken_at)?;
            current::store(tx, &next, stamp.taken_at)?;
            Ok(Committed {
                document: document.clone(),
                backup: stamp.name,
            })
        })?;

        tracing::info!(backup = %committed.backup, "Resume replaced");
        Ok(committed)
    }

    /// Shallow-merge `partial` into the current document
    ///
    /// Top-level keys of `partial` overwrite the stored ones; nested values
    /// are replaced, not merged. The merged result must itself validate.
    pub fn patch(&self, partial: &Resume) -> Result<Resume> {
        self.patch_committed(partial).map(|c| c.document)
    }

    /// [`patch`](Self::patch), also reporting the backup name
    pub fn patch_committed(&self, partial: &Resume) -> Result<Committed> {
        let overlay = partial.to_object()?;
        let committed = self.db.write(|tx| {
            let previous = current::load(tx)?;
            let mut merged = match &previous {
                Value::Object(map) => map.clone(),
                other => {
                    return Err(ResumeError::invalid_field(
                        "",
                        format!("Stored document is not an object: {}", other),
                    ))
                }
            };
            merged.extend(overlay);
            let merged = Value::Object(merged);
            let document = schema::validate_resume(&merged).map_err(ResumeError::Validation)?;

            let stamp = self.policy.stamp(SnapshotKind::Backup);
            snapshots::put(tx, &stamp.name, &previous, stamp.taken_at)?;
            current::store(tx, &merged, stamp.taken_at)?;
            Ok(Committed {
                document,
                backup: stamp.name,
            })
        })?;

        tracing::info!(backup = %committed.backup, "Resume patched");
        Ok(committed)
    }

    pub(crate) fn database(&self) -> &Database {
        &self.db
    }

    pub(crate) fn policy(&self) -> &VersioningPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SnapshotStore;
    use crate::versioning::ManualClock;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;

    fn setup() -> (DocumentStore, SnapshotStore) {
        let db = Database::open_in_memory().unwrap();
        let clock = Arc::new(ManualClock::stepping(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            chrono::Duration::seconds(1),
        ));
        (
            DocumentStore::new(db.clone(), VersioningPolicy::new(clock.clone())),
            SnapshotStore::with_clock(db, clock),
        )
    }

    fn resume(value: Value) -> Resume {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_read_uninitialized_is_empty() {
        let (docs, _) = setup();
        assert_eq!(docs.read().unwrap(), Resume::empty());
    }

    #[test]
    fn test_replace_round_trip_and_backup() {
        let (docs, snaps) = setup();
        let first = resume(json!({"name": "Ada"}));
        let second = resume(json!({"name": "Grace", "custom": {"x": 1}}));

        docs.replace(&first).unwrap();
        let committed = docs.replace_committed(&second).unwrap();

        assert_eq!(docs.read().unwrap(), second);
        assert_eq!(
            docs.read_raw().unwrap(),
            json!({"name": "Grace", "custom": {"x": 1}})
        );
        let backup = snaps.get(&committed.backup).unwrap().unwrap();
        assert_eq!(backup.data, json!({"name": "Ada"}));
        assert_eq!(snaps.list().unwrap().len(), 2);
    }

    #[test]
    fn test_patch_merges_and_backs_up() {
        let (docs, snaps) = setup();
        docs.replace(&resume(json!({"name": "Ada", "skills": ["math"]})))
            .unwrap();

        let committed = docs
            .patch_committed(&resume(json!({"email": "ada@example.com"})))
            .unwrap();

        assert_eq!(
            committed.document.to_value().unwrap(),
            json!({"name": "Ada", "skills": ["math"], "email": "ada@example.com"})
        );
        let backup = snaps.get(&committed.backup).unwrap().unwrap();
        assert_eq!(backup.data, json!({"name": "Ada", "skills": ["math"]}));
    }

    #[test]
    fn test_patch_rejected_when_merge_invalid() {
        let (docs, snaps) = setup();
        docs.db
            .with_connection(|conn| current::store(conn, &json!({"name": 5}), Utc::now()))
            .unwrap();

        let err = docs.patch(&resume(json!({"summary": "hi"}))).unwrap_err();
        assert!(matches!(err, ResumeError::Validation(_)));
        assert_eq!(snaps.count().unwrap(), 0, "no backup for a rejected patch");
        assert_eq!(docs.read_raw().unwrap(), json!({"name": 5}));
    }

    #[test]
    fn test_failed_write_leaves_no_partial_state() {
        let (docs, snaps) = setup();
        docs.replace(&resume(json!({"name": "Ada"}))).unwrap();
        docs.db
            .with_connection(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER block_resume BEFORE UPDATE ON resumes
                     BEGIN SELECT RAISE(ABORT, 'simulated write failure'); END;",
                )?;
                Ok(())
            })
            .unwrap();

        let err = docs.replace(&resume(json!({"name": "Grace"}))).unwrap_err();
        assert!(err.is_storage_failure());
        assert_eq!(docs.read_raw().unwrap(), json!({"name": "Ada"}));
        assert_eq!(snaps.count().unwrap(), 1, "backup rolled back with the write");
    }
}
