//! # Lexis Core
//!
//! Storage engine of the Lexis inverted index.
//!
//! This crate provides:
//! - Lexicon index files and their key-frame codecs
//! - Posting lists with skip data
//! - An external sort for data larger than memory
//! - Sort caches mapping documents to value ordinals
//! - Cross-process lock files
//!
//! Files are read and written through a [`lexis_storage::Folder`], so the
//! same code runs against a directory on disk or an in-memory folder.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
mod error;
pub mod index;
pub mod plan;
pub mod store;
pub mod util;

pub use config::{Architecture, LockConfig, SortConfig};
pub use error::{CoreError, CoreResult};
pub use index::{
    LexIndex, LexIndexWriter, PostingReader, PostingWriter, Segment, SortCache, SortReader,
    SortWriter, TermInfo,
};
pub use plan::{FieldType, PrimitiveKind, Schema, Value};
pub use store::{InStream, LockFileLock, OutStream};
pub use util::{SortExternal, SortItem};
