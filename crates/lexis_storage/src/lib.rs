//! # Lexis Storage
//!
//! Byte-store backends and the directory abstraction used by Lexis.
//!
//! This crate is the lowest layer of the workspace. Backends are **opaque
//! byte stores**: they never interpret the index files written through them.
//!
//! ## Design Principles
//!
//! - A backend is one file worth of bytes (read at offset, append, flush)
//! - A [`Folder`] maps relative, `/`-separated paths to backends
//! - No knowledge of lexicons, postings, sort caches or lock records
//! - Everything is `Send + Sync`
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests, spill runs and [`RamFolder`] files
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Available Folders
//!
//! - [`RamFolder`] - Whole directory tree held in memory
//! - [`FsFolder`] - Directory tree rooted at a filesystem path
//!
//! ## Example
//!
//! ```rust
//! use lexis_storage::{Folder, RamFolder, StorageBackend};
//!
//! let folder = RamFolder::new();
//! folder.mkdir("seg_1").unwrap();
//! let mut out = folder.open_out("seg_1/lexicon-1.ix").unwrap();
//! out.append(b"hello world").unwrap();
//!
//! let input = folder.open_in("seg_1/lexicon-1.ix").unwrap();
//! assert_eq!(input.read_at(6, 5).unwrap(), b"world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod folder;
mod fs_folder;
mod memory;
mod ram_folder;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use folder::{parent_dir, Folder};
pub use fs_folder::FsFolder;
pub use memory::InMemoryBackend;
pub use ram_folder::RamFolder;
