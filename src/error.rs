//! Error types for the lastlog store
//!
//! Every public operation returns a typed failure. The `Display` output is the
//! short human-readable message a caller may show; `kind()` tells the caller
//! which class of failure it is without string matching.

use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type alias using LastlogError
pub type Result<T> = std::result::Result<T, LastlogError>;

/// Unified error type for lastlog store operations
#[derive(Debug, Error)]
pub enum LastlogError {
    // -------------------------------------------------------------------------
    // Open Errors
    // -------------------------------------------------------------------------
    #[error("cannot open database {}: {reason}", .path.display())]
    Open { path: PathBuf, reason: String },

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("cannot encode record: {0}")]
    Encode(String),

    #[error("malformed record payload: {0}")]
    Decode(String),

    #[error("corrupt entry for user '{username}': {reason}")]
    CorruptRecord { username: String, reason: String },

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("no entry for user '{0}'")]
    NotFound(String),

    #[error("cannot rename '{from}' to '{to}': target user already has an entry")]
    Conflict { from: String, to: String },

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Legacy Import Errors
    // -------------------------------------------------------------------------
    #[error("legacy lastlog file: {0}")]
    LegacyFormat(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("iteration stopped by visitor: {0}")]
    Visitor(Box<dyn std::error::Error + Send + Sync>),
}

/// Coarse failure class of a [`LastlogError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Open,
    Encode,
    Decode,
    CorruptRecord,
    NotFound,
    Conflict,
    Storage,
    LegacyFormat,
    Config,
    Visitor,
}

impl LastlogError {
    /// Failure class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LastlogError::Open { .. } => ErrorKind::Open,
            LastlogError::Encode(_) => ErrorKind::Encode,
            LastlogError::Decode(_) => ErrorKind::Decode,
            LastlogError::CorruptRecord { .. } => ErrorKind::CorruptRecord,
            LastlogError::NotFound(_) => ErrorKind::NotFound,
            LastlogError::Conflict { .. } => ErrorKind::Conflict,
            LastlogError::Storage(_) | LastlogError::Io(_) => ErrorKind::Storage,
            LastlogError::LegacyFormat(_) => ErrorKind::LegacyFormat,
            LastlogError::Config(_) => ErrorKind::Config,
            LastlogError::Visitor(_) => ErrorKind::Visitor,
        }
    }

    /// True for a missing entry
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        LastlogError::Open {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Re-tag a codec failure as corruption of a stored entry
    pub(crate) fn into_corrupt(self, username: &str) -> Self {
        match self {
            LastlogError::Decode(reason) => LastlogError::CorruptRecord {
                username: username.to_string(),
                reason,
            },
            other => other,
        }
    }
}

impl From<rusqlite::Error> for LastlogError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                LastlogError::Storage(format!("database is busy: {}", err))
            }
            _ => LastlogError::Storage(err.to_string()),
        }
    }
}
