//! Directory abstraction trait definition.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use std::fmt;

/// A tree of named files, addressed by relative `/`-separated paths such as
/// `"seg_1/lexicon-3.ix"` or `"locks/write.lock"`.
///
/// Index readers open their streams through a `Folder`, and the lock
/// manager relies on [`Folder::hard_link`] failing when the destination
/// exists: that failure is the atomic create-if-absent primitive which
/// keeps two processes from holding the same lock.
///
/// # Implementors
///
/// - [`super::FsFolder`]
/// - [`super::RamFolder`]
pub trait Folder: Send + Sync + fmt::Debug {
    /// Opens an existing file for reading.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no file exists at `path`.
    fn open_in(&self, path: &str) -> StorageResult<Box<dyn StorageBackend>>;

    /// Creates (or truncates) a file for writing.
    ///
    /// The parent directory must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the parent directory is missing.
    fn open_out(&self, path: &str) -> StorageResult<Box<dyn StorageBackend>>;

    /// Returns true if a file or directory exists at `path`.
    fn exists(&self, path: &str) -> bool;

    /// Returns true if a directory exists at `path`.
    fn is_directory(&self, path: &str) -> bool;

    /// Creates a single directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyExists`] if something already exists
    /// at `path`, or [`StorageError::NotFound`] if the parent is missing.
    fn mkdir(&self, path: &str) -> StorageResult<()>;

    /// Deletes a file or an empty directory.
    ///
    /// Returns `false` if nothing existed at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry exists but cannot be removed.
    fn delete(&self, path: &str) -> StorageResult<bool>;

    /// Creates `to` as a second name for the file at `from`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyExists`] if `to` exists, and
    /// [`StorageError::NotFound`] if `from` does not.
    fn hard_link(&self, from: &str, to: &str) -> StorageResult<()>;

    /// Reads a whole file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    fn slurp_file(&self, path: &str) -> StorageResult<Vec<u8>> {
        self.open_in(path)?.read_all()
    }

    /// Creates (or truncates) a file and writes `data` to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    fn spew_file(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let mut out = self.open_out(path)?;
        out.append(data)?;
        out.flush()
    }
}

/// Returns the directory part of a folder path, or `None` for top-level
/// entries.
#[must_use]
pub fn parent_dir(path: &str) -> Option<&str> {
    path.rfind('/').map(|idx| &path[..idx])
}

/// Rejects empty paths, absolute paths and `.`/`..` components.
pub(crate) fn check_path(path: &str) -> StorageResult<()> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path
            .split('/')
            .any(|part| part.is_empty() || part == "." || part == "..");
    if invalid {
        return Err(StorageError::InvalidPath {
            path: path.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_dir_of_nested_and_top_level() {
        assert_eq!(parent_dir("locks/write.lock"), Some("locks"));
        assert_eq!(parent_dir("a/b/c"), Some("a/b"));
        assert_eq!(parent_dir("segmeta.json"), None);
    }

    #[test]
    fn check_path_rejects_escapes() {
        assert!(check_path("seg_1/lexicon-1.ix").is_ok());
        assert!(check_path("").is_err());
        assert!(check_path("/etc/passwd").is_err());
        assert!(check_path("seg_1/../x").is_err());
        assert!(check_path("seg_1//x").is_err());
    }
}
