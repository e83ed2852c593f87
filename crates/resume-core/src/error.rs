//! Error types for Resume Core
//!
//! Every fallible operation in the crate returns [`ResumeError`]. The first four
//! variants are expected, locally detected conditions; the storage variants are
//! infrastructure failures and are the only ones that trigger an emergency backup.

use serde::Serialize;
use thiserror::Error;

use crate::schema::FieldIssue;

/// Result type alias for Resume Core operations
pub type Result<T> = std::result::Result<T, ResumeError>;

/// Main error type for Resume Core operations
#[derive(Error, Debug)]
pub enum ResumeError {
    /// Candidate document or partial failed schema checks
    #[error("Validation error: {}", summarize(.0))]
    Validation(Vec<FieldIssue>),

    /// Credential check failed
    #[error("Invalid API key")]
    Unauthorized,

    /// Referenced snapshot does not exist
    #[error("Version {0} not found")]
    NotFound(String),

    /// Snapshot exists but its content would corrupt the live document
    #[error("Version {name} is invalid and cannot be restored: {}", summarize(.issues))]
    InvalidSnapshot {
        name: String,
        issues: Vec<FieldIssue>,
    },

    /// Underlying SQLite read/write failed
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Persisted JSON could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors (database directory creation)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable classification of [`ResumeError`] used by transports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    Unauthorized,
    NotFound,
    InvalidSnapshot,
    StorageFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidSnapshot => "invalid_snapshot",
            ErrorKind::StorageFailure => "storage_failure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ResumeError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResumeError::Validation(_) => ErrorKind::ValidationError,
            ResumeError::Unauthorized => ErrorKind::Unauthorized,
            ResumeError::NotFound(_) => ErrorKind::NotFound,
            ResumeError::InvalidSnapshot { .. } => ErrorKind::InvalidSnapshot,
            ResumeError::Storage(_) | ResumeError::Serialization(_) | ResumeError::Io(_) => {
                ErrorKind::StorageFailure
            }
        }
    }

    /// Whether the error is a storage failure that warrants an emergency backup
    pub fn is_storage_failure(&self) -> bool {
        self.kind() == ErrorKind::StorageFailure
    }

    /// Field-level detail, if the error carries any
    pub fn issues(&self) -> Option<&[FieldIssue]> {
        match self {
            ResumeError::Validation(issues) | ResumeError::InvalidSnapshot { issues, .. } => {
                Some(issues)
            }
            _ => None,
        }
    }

    /// Build a single-field validation error
    pub fn invalid_field(path: impl Into<String>, message: impl Into<String>) -> Self {
        ResumeError::Validation(vec![FieldIssue::new(path, message)])
    }
}

fn summarize(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ResumeError::Unauthorized.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            ResumeError::NotFound("backup-x.json".into()).kind(),
            ErrorKind::NotFound
        );
        let storage = ResumeError::from(rusqlite::Error::InvalidQuery);
        assert!(storage.is_storage_failure());
        assert_eq!(storage.kind().as_str(), "storage_failure");
    }

    #[test]
    fn test_validation_message_lists_fields() {
        let err = ResumeError::Validation(vec![
            FieldIssue::new("email", "Invalid email"),
            FieldIssue::new("skills.1", "Expected string, received number"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("email: Invalid email"));
        assert!(msg.contains("skills.1"));
        assert_eq!(err.issues().map(|i| i.len()), Some(2));
    }
}
