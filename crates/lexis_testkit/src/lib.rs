//! # Lexis Testkit
//!
//! Test utilities for Lexis.
//!
//! This crate provides:
//! - Folder fixtures and builders for segments, lexicons and sort caches
//! - A scriptable process table for lock tests
//! - Property-based test generators using proptest
//! - Known-answer vectors for the on-disk encodings
//! - Fuzz targets for every decoder
//! - Stress helpers for lock contention and large sorts
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lexis_testkit::prelude::*;
//!
//! #[test]
//! fn seeks_in_a_lexicon() {
//!     let folder = TestFolder::memory();
//!     let lexicon = LexiconFixture::text(4, &["apple", "pear"]);
//!     let mut index = lexicon.build(folder.folder()).unwrap();
//!     index.seek(None).unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod fuzz;
pub mod generators;
pub mod integration;
pub mod stress;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::fuzz::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use fuzz::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
pub use vectors::*;
