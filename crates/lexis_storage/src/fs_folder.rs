//! Filesystem-backed folder.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::file::FileBackend;
use crate::folder::{check_path, Folder};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A folder rooted at a directory on the local filesystem.
///
/// # Hard links
///
/// [`Folder::hard_link`] maps to `std::fs::hard_link`, which refuses to
/// replace an existing destination. Some filesystems (FAT, certain network
/// mounts) cannot create hard links at all; there the link is emulated by
/// creating the destination with `create_new` (an exclusive, atomic
/// create-if-absent) and copying the source bytes into it. The exclusion
/// guarantee is the same. The difference is that another process may
/// briefly observe the destination before its contents are complete.
#[derive(Debug, Clone)]
pub struct FsFolder {
    root: PathBuf,
}

impl FsFolder {
    /// Opens a folder rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> StorageResult<PathBuf> {
        check_path(path)?;
        Ok(path.split('/').fold(self.root.clone(), |acc, part| acc.join(part)))
    }

    fn emulate_link(from: &Path, to: &Path, to_name: &str) -> StorageResult<()> {
        let data = fs::read(from)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(to)
            .map_err(|e| map_exists(e, to_name))?;
        file.write_all(&data)?;
        file.sync_all()?;
        Ok(())
    }
}

fn map_exists(e: io::Error, path: &str) -> StorageError {
    match e.kind() {
        io::ErrorKind::AlreadyExists => StorageError::already_exists(path),
        io::ErrorKind::NotFound => StorageError::not_found(path),
        _ => StorageError::Io(e),
    }
}

impl Folder for FsFolder {
    fn open_in(&self, path: &str) -> StorageResult<Box<dyn StorageBackend>> {
        let full = self.full_path(path)?;
        if full.is_dir() {
            return Err(StorageError::not_found(path));
        }
        Ok(Box::new(FileBackend::open_existing(&full)?))
    }

    fn open_out(&self, path: &str) -> StorageResult<Box<dyn StorageBackend>> {
        let full = self.full_path(path)?;
        match full.parent() {
            Some(parent) if !parent.is_dir() => {
                return Err(StorageError::not_found(parent.display().to_string()));
            }
            _ => {}
        }
        Ok(Box::new(FileBackend::create(&full)?))
    }

    fn exists(&self, path: &str) -> bool {
        self.full_path(path).map(|p| p.exists()).unwrap_or(false)
    }

    fn is_directory(&self, path: &str) -> bool {
        self.full_path(path).map(|p| p.is_dir()).unwrap_or(false)
    }

    fn mkdir(&self, path: &str) -> StorageResult<()> {
        let full = self.full_path(path)?;
        fs::create_dir(&full).map_err(|e| map_exists(e, path))
    }

    fn delete(&self, path: &str) -> StorageResult<bool> {
        let full = self.full_path(path)?;
        let result = if full.is_dir() {
            fs::remove_dir(&full)
        } else {
            fs::remove_file(&full)
        };
        match result {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn hard_link(&self, from: &str, to: &str) -> StorageResult<()> {
        let from_full = self.full_path(from)?;
        let to_full = self.full_path(to)?;
        match fs::hard_link(&from_full, &to_full) {
            Ok(()) => Ok(()),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::Unsupported | io::ErrorKind::PermissionDenied
                ) && from_full.is_file() =>
            {
                Self::emulate_link(&from_full, &to_full, to)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(StorageError::already_exists(to))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && !from_full.exists() => {
                Err(StorageError::not_found(from))
            }
            Err(e) => Err(map_exists(e, to)),
        }
    }
}
