//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of a store.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// No file or directory exists at the given path.
    #[error("not found: '{path}'")]
    NotFound {
        /// Folder-relative path.
        path: String,
    },

    /// A file or directory already exists at the given path.
    #[error("already exists: '{path}'")]
    AlreadyExists {
        /// Folder-relative path.
        path: String,
    },

    /// The path cannot be used (empty, absolute, or escaping the folder).
    #[error("invalid path: '{path}'")]
    InvalidPath {
        /// The offending path.
        path: String,
    },
}

impl StorageError {
    /// Creates a not-found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates an already-exists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists { path: path.into() }
    }

    /// Returns true if this error reports a missing file or directory.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Returns true if this error reports an existing destination.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::AlreadyExists { .. } => true,
            Self::Io(e) => e.kind() == io::ErrorKind::AlreadyExists,
            _ => false,
        }
    }
}
