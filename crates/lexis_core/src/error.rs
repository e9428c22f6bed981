//! Error types for Lexis core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Lexis core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend or folder error.
    #[error("storage error: {0}")]
    Storage(#[from] lexis_storage::StorageError),

    /// Number codec error.
    #[error("codec error: {0}")]
    Codec(#[from] lexis_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unsupported format version or corrupt record shape.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// A field required by the operation is not known.
    #[error("unknown field: '{field}'")]
    MissingField {
        /// Name of the field.
        field: String,
    },

    /// A value cannot be compared with the values of a field.
    #[error("type mismatch: expected {expected}, got {found}")]
    TypeMismatch {
        /// The kind the field stores.
        expected: String,
        /// The kind that was supplied.
        found: String,
    },

    /// A sort cache was requested for a field that isn't sortable.
    #[error("'{field}' isn't a sortable field")]
    NotSortable {
        /// Name of the field.
        field: String,
    },

    /// A lock could not be obtained.
    #[error("can't obtain lock at '{path}': {message}")]
    LockAcquisition {
        /// Folder-relative path of the lock file.
        path: String,
        /// What went wrong.
        message: String,
    },

    /// A stale lock matched for deletion but could not be removed.
    #[error("can't delete stale lock '{path}': {message}")]
    StaleLockCleanup {
        /// Folder-relative path of the lock file.
        path: String,
        /// What went wrong.
        message: String,
    },

    /// An argument is out of range or malformed.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// An API was used out of order (programmer error).
    #[error("invariant violation: {message}")]
    InvariantViolation {
        /// Description of the misuse.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: impl ToString, found: impl ToString) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Creates a not-sortable error.
    pub fn not_sortable(field: impl Into<String>) -> Self {
        Self::NotSortable {
            field: field.into(),
        }
    }

    /// Creates a lock acquisition error.
    pub fn lock_acquisition(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LockAcquisition {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a stale lock cleanup error.
    pub fn stale_lock_cleanup(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StaleLockCleanup {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invariant violation error.
    pub fn invariant_violation(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Classifies a codec error raised while decoding `what`: truncated
    /// input and oversized varints are corrupt data, anything else passes
    /// through unchanged.
    pub fn from_decode(what: &str, e: lexis_codec::CodecError) -> Self {
        match e {
            lexis_codec::CodecError::UnexpectedEof => {
                Self::invalid_format(format!("truncated {what}"))
            }
            lexis_codec::CodecError::VarintOverflow { bits } => {
                Self::invalid_format(format!("{what} holds a varint wider than {bits} bits"))
            }
            other => Self::Codec(other),
        }
    }

    /// Returns true if this error reports a failed lock acquisition.
    ///
    /// Callers may retry these according to their own policy.
    #[must_use]
    pub fn is_lock_acquisition(&self) -> bool {
        matches!(self, Self::LockAcquisition { .. })
    }

    /// Returns true if this error reports API misuse.
    #[must_use]
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }
}
