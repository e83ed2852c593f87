//! Security collaborators for mutating operations
//!
//! - [`sanitize_filename`] turns an untrusted snapshot name into a lookup key.
//! - [`ApiKeyGuard`] compares a caller credential with the configured secret.
//!
//! With no secret configured the guard runs in [`AuthMode::Locked`] and rejects
//! every mutation. There is no unauthenticated mode.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ResumeError, Result};

/// Strip path separators, `..` sequences and any character outside
/// `[a-zA-Z0-9._-]`, in that order
///
/// `"../../etc/passwd"` becomes `"etcpasswd"`. The result may be empty;
/// use [`snapshot_key`] to reject that case.
pub fn sanitize_filename(name: &str) -> String {
    let without_separators: String = name.chars().filter(|c| !matches!(c, '/' | '\\')).collect();
    without_separators
        .replace("..", "")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

/// Sanitize `name` and refuse keys that sanitize to nothing
pub fn snapshot_key(name: &str) -> Result<String> {
    let key = sanitize_filename(name);
    if key.is_empty() {
        return Err(ResumeError::invalid_field(
            "filename",
            "Filename contains no usable characters",
        ));
    }
    Ok(key)
}

/// How mutating calls are authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// No secret configured: every mutation is rejected
    Locked,
    /// Callers must present the configured secret
    SharedSecret,
}

/// Shared-secret check for mutating operations
#[derive(Clone)]
pub struct ApiKeyGuard {
    secret: Option<blake3::Hash>,
}

impl fmt::Debug for ApiKeyGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyGuard")
            .field("mode", &self.mode())
            .finish()
    }
}

impl ApiKeyGuard {
    /// A blank or whitespace-only secret counts as unconfigured
    pub fn new(secret: Option<&str>) -> Self {
        let secret = secret
            .filter(|s| !s.trim().is_empty())
            .map(|s| blake3::hash(s.as_bytes()));
        Self { secret }
    }

    /// Guard that rejects everything
    pub fn locked() -> Self {
        Self { secret: None }
    }

    pub fn mode(&self) -> AuthMode {
        if self.secret.is_some() {
            AuthMode::SharedSecret
        } else {
            AuthMode::Locked
        }
    }

    /// Whether `provided` grants write access
    ///
    /// Digests are compared rather than raw strings; `blake3::Hash` equality
    /// is constant-time.
    pub fn is_authorized(&self, provided: Option<&str>) -> bool {
        let Some(expected) = self.secret else {
            return false;
        };
        match provided {
            Some(key) if !key.trim().is_empty() => blake3::hash(key.as_bytes()) == expected,
            _ => false,
        }
    }

    /// [`is_authorized`](Self::is_authorized) as a `Result`
    pub fn check(&self, provided: Option<&str>) -> Result<()> {
        if self.is_authorized(provided) {
            Ok(())
        } else {
            tracing::warn!(mode = ?self.mode(), "Rejected mutating call: invalid API key");
            Err(ResumeError::Unauthorized)
        }
    }
}
