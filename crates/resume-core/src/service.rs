//! Resume Service - the operations transports call
//!
//! Applies the collaborators around the stores in a fixed order: credential
//! check, then schema validation, then the transactional mutation. A storage
//! failure during `update`/`patch` triggers an emergency backup of the document
//! as it was before the attempt; `restore` handles its own emergency backup.

use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::document::{Committed, DocumentStore};
use crate::error::{ResumeError, Result};
use crate::restore::{RestoreEngine, Restored};
use crate::schema;
use crate::security::{self, ApiKeyGuard, AuthMode};
use crate::storage::{Database, Snapshot, SnapshotInfo, SnapshotStore};
use crate::versioning::{Clock, SystemClock, VersioningPolicy};

/// Service health as reported by transports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub auth_mode: AuthMode,
    pub snapshot_count: i64,
}

#[derive(Debug, Clone)]
pub struct ResumeService {
    db: Database,
    documents: DocumentStore,
    snapshots: SnapshotStore,
    restorer: RestoreEngine,
    policy: VersioningPolicy,
    guard: ApiKeyGuard,
}

impl ResumeService {
    pub fn new(db: Database, guard: ApiKeyGuard) -> Self {
        Self::with_clock(db, guard, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, guard: ApiKeyGuard, clock: Arc<dyn Clock>) -> Self {
        let policy = VersioningPolicy::new(clock.clone());
        let documents = DocumentStore::new(db.clone(), policy.clone());
        let restorer = RestoreEngine::for_store(&documents);
        Self {
            snapshots: SnapshotStore::with_clock(db.clone(), clock),
            db,
            documents,
            restorer,
            policy,
            guard,
        }
    }

    /// Open the database at `path` and build a service over it
    pub fn open(path: impl AsRef<Path>, guard: ApiKeyGuard) -> Result<Self> {
        Ok(Self::new(Database::open(path)?, guard))
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Current document as stored
    ///
    /// A stored document that no longer validates is still returned; the
    /// violations are logged.
    pub fn get_resume(&self) -> Result<Value> {
        let document = self.documents.read_raw()?;
        let issues = schema::check_resume(&document);
        if !issues.is_empty() {
            tracing::warn!(issues = issues.len(), "Stored resume fails validation");
            for issue in &issues {
                tracing::warn!(path = %issue.path, message = %issue.message, "Resume validation warning");
            }
        }
        Ok(document)
    }

    /// Replace the whole document
    pub fn update_resume(&self, resume: &Value, api_key: Option<&str>) -> Result<Committed> {
        self.guard.check(api_key)?;
        let resume = schema::validate_resume(resume).map_err(ResumeError::Validation)?;
        self.guarded_mutation("update_resume", || self.documents.replace_committed(&resume))
    }

    /// Shallow-merge a partial document into the current one
    pub fn patch_resume(&self, partial: &Value, api_key: Option<&str>) -> Result<Committed> {
        self.guard.check(api_key)?;
        let partial = schema::validate_resume(partial).map_err(ResumeError::Validation)?;
        self.guarded_mutation("patch_resume", || self.documents.patch_committed(&partial))
    }

    /// Snapshot metadata, newest first
    pub fn list_versions(&self) -> Result<Vec<SnapshotInfo>> {
        self.snapshots.list()
    }

    /// One snapshot by (untrusted) name
    pub fn get_version(&self, filename: &str) -> Result<Snapshot> {
        let key = security::snapshot_key(filename)?;
        self.snapshots
            .get(&key)?
            .ok_or(ResumeError::NotFound(key))
    }

    /// Restore a snapshot by (untrusted) name
    pub fn restore_version(&self, filename: &str, api_key: Option<&str>) -> Result<Restored> {
        self.guard.check(api_key)?;
        let key = security::snapshot_key(filename)?;
        self.restorer.restore_with_backup(&key)
    }

    pub fn status(&self) -> Result<ServiceStatus> {
        Ok(ServiceStatus {
            auth_mode: self.guard.mode(),
            snapshot_count: self.snapshots.count()?,
        })
    }

    /// Run a mutation; on storage failure persist an emergency backup of the
    /// pre-mutation document and return the original error
    fn guarded_mutation(
        &self,
        operation: &'static str,
        mutate: impl FnOnce() -> Result<Committed>,
    ) -> Result<Committed> {
        let before = self.documents.read_raw()?;
        match mutate() {
            Ok(committed) => Ok(committed),
            Err(e) if e.is_storage_failure() => {
                tracing::error!(operation, error = %e, "Resume mutation failed");
                self.policy.emergency_backup(&self.db, &before, &e);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}
