//! Resume Core - a single JSON document with automatic version history
//!
//! Resume Core keeps exactly one current resume document and takes a named
//! snapshot of it before every change, so any earlier state can be restored.
//!
//! # Architecture
//!
//! Leaf-first:
//!
//! 1. **Snapshot Store** (`storage::snapshots`): named, timestamped JSON blobs with upsert-by-name
//! 2. **Document Store** (`document`): the current-document slot; read, replace, shallow patch
//! 3. **Versioning Policy** (`versioning`): `backup-*`, `pre-restore-*` and `emergency-backup-*` naming
//! 4. **Restore Engine** (`restore`): validates a snapshot and replays it
//!
//! `service::ResumeService` wraps them with the credential check, schema
//! validation and filename sanitization that transports rely on.
//!
//! # Quick Start
//!
//! ```
//! use resume_core::{ApiKeyGuard, Database, ManualClock, ResumeService};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! // One second between snapshots so their names never collide
//! let clock = ManualClock::stepping(chrono::Utc::now(), chrono::Duration::seconds(1));
//! let db = Database::open_in_memory()?;
//! let service = ResumeService::with_clock(db, ApiKeyGuard::new(Some("secret")), Arc::new(clock));
//!
//! service.patch_resume(&json!({ "name": "Ada" }), Some("secret"))?;
//! let patched = service.patch_resume(&json!({ "email": "ada@example.com" }), Some("secret"))?;
//! assert_eq!(patched.document.name.as_deref(), Some("Ada"));
//!
//! // Two backups: `{}` and `{ "name": "Ada" }`
//! assert_eq!(service.list_versions()?.len(), 2);
//! # Ok::<(), resume_core::ResumeError>(())
//! ```
//!
//! # Guarantees
//!
//! - Every successful mutation commits its pre-mutation snapshot in the same transaction
//! - A failed mutation writes nothing; the service then attempts an emergency backup
//! - A snapshot that fails validation is never restored

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod document;
pub mod error;
pub mod restore;
pub mod resume;
pub mod schema;
pub mod security;
pub mod service;
pub mod storage;
pub mod versioning;

pub use document::{Committed, DocumentStore};
pub use error::{ErrorKind, Result, ResumeError};
pub use restore::{RestoreEngine, RestorePhase, Restored};
pub use resume::Resume;
pub use schema::{validate_resume, FieldIssue};
pub use security::{sanitize_filename, ApiKeyGuard, AuthMode};
pub use service::{ResumeService, ServiceStatus};
pub use storage::{Database, Snapshot, SnapshotInfo, SnapshotStore};
pub use versioning::{Clock, ManualClock, SnapshotKind, SystemClock, VersioningPolicy};
