//! In-memory folder.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::folder::{check_path, parent_dir, Folder};
use crate::memory::InMemoryBackend;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Entry {
    File(Arc<RwLock<Vec<u8>>>),
    Dir,
}

/// A folder whose whole tree lives in memory.
///
/// Files are shared buffers: every handle returned by
/// [`Folder::open_in`] and every hard link views the same bytes, the way
/// directory entries share an inode on disk. A single `RamFolder` shared
/// through an `Arc` can therefore stand in for a directory that several
/// processes use at once.
///
/// # Example
///
/// ```rust
/// use lexis_storage::{Folder, RamFolder};
///
/// let folder = RamFolder::new();
/// folder.mkdir("locks").unwrap();
/// folder.spew_file("locks/a.tmp", b"{}").unwrap();
/// folder.hard_link("locks/a.tmp", "locks/a.lock").unwrap();
/// assert!(folder.hard_link("locks/a.tmp", "locks/a.lock").is_err());
/// ```
#[derive(Debug, Default)]
pub struct RamFolder {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl RamFolder {
    /// Creates an empty folder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the paths of all files, in sorted order.
    #[must_use]
    pub fn list_files(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .filter(|(_, entry)| matches!(entry, Entry::File(_)))
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn parent_exists(entries: &BTreeMap<String, Entry>, path: &str) -> bool {
        match parent_dir(path) {
            None => true,
            Some(dir) => matches!(entries.get(dir), Some(Entry::Dir)),
        }
    }
}

impl Folder for RamFolder {
    fn open_in(&self, path: &str) -> StorageResult<Box<dyn StorageBackend>> {
        check_path(path)?;
        match self.entries.read().get(path) {
            Some(Entry::File(data)) => Ok(Box::new(InMemoryBackend::shared(Arc::clone(data)))),
            _ => Err(StorageError::not_found(path)),
        }
    }

    fn open_out(&self, path: &str) -> StorageResult<Box<dyn StorageBackend>> {
        check_path(path)?;
        let mut entries = self.entries.write();
        if !Self::parent_exists(&entries, path) {
            return Err(StorageError::not_found(parent_dir(path).unwrap_or(path)));
        }
        if matches!(entries.get(path), Some(Entry::Dir)) {
            return Err(StorageError::already_exists(path));
        }
        let backend = InMemoryBackend::new();
        entries.insert(path.to_string(), Entry::File(backend.handle()));
        Ok(Box::new(backend))
    }

    fn exists(&self, path: &str) -> bool {
        self.entries.read().contains_key(path)
    }

    fn is_directory(&self, path: &str) -> bool {
        matches!(self.entries.read().get(path), Some(Entry::Dir))
    }

    fn mkdir(&self, path: &str) -> StorageResult<()> {
        check_path(path)?;
        let mut entries = self.entries.write();
        if entries.contains_key(path) {
            return Err(StorageError::already_exists(path));
        }
        if !Self::parent_exists(&entries, path) {
            return Err(StorageError::not_found(parent_dir(path).unwrap_or(path)));
        }
        entries.insert(path.to_string(), Entry::Dir);
        Ok(())
    }

    fn delete(&self, path: &str) -> StorageResult<bool> {
        check_path(path)?;
        let mut entries = self.entries.write();
        match entries.get(path) {
            None => Ok(false),
            Some(Entry::File(_)) => {
                entries.remove(path);
                Ok(true)
            }
            Some(Entry::Dir) => {
                let prefix = format!("{path}/");
                if entries.keys().any(|key| key.starts_with(&prefix)) {
                    return Err(StorageError::Io(io::Error::new(
                        io::ErrorKind::Other,
                        format!("directory not empty: '{path}'"),
                    )));
                }
                entries.remove(path);
                Ok(true)
            }
        }
    }

    fn hard_link(&self, from: &str, to: &str) -> StorageResult<()> {
        check_path(from)?;
        check_path(to)?;
        let mut entries = self.entries.write();
        let data = match entries.get(from) {
            Some(Entry::File(data)) => Arc::clone(data),
            _ => return Err(StorageError::not_found(from)),
        };
        if entries.contains_key(to) {
            return Err(StorageError::already_exists(to));
        }
        if !Self::parent_exists(&entries, to) {
            return Err(StorageError::not_found(parent_dir(to).unwrap_or(to)));
        }
        entries.insert(to.to_string(), Entry::File(data));
        Ok(())
    }
}
