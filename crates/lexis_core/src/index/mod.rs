//! On-disk index structures of a segment.
//!
//! - [`LexIndex`] and [`LexIndexWriter`]: the sparse index over a field's
//!   lexicon
//! - [`PostingWriter`] and [`PostingReader`]: delta-coded postings with
//!   [`SkipStepper`] skip records
//! - [`SortWriter`], [`SortReader`] and [`SortCache`]: per-document
//!   ordinals of sortable fields
//!
//! Every file lives under the segment's directory and is named after the
//! field number the [`Segment`] assigns.

mod lex_index;
mod posting;
mod segment;
mod skip;
mod sort_cache;
mod sort_reader;
mod sort_writer;
mod term_info;
mod term_stepper;

pub use lex_index::{LexIndex, LexIndexWriter};
pub use posting::{
    decode_posting, encode_posting, write_posting, PayloadLen, PostingReader, PostingWriter,
    RawPosting,
};
pub use segment::{Segment, SEGMETA_FILENAME};
pub use skip::SkipStepper;
pub use sort_cache::{OrdLayout, SortCache, SortValues};
pub use sort_reader::{SortReader, MAX_SORT_FORMAT, MIN_SORT_FORMAT};
pub use sort_writer::{SortFieldStats, SortFieldWriter, SortWriter, SORT_FORMAT};
pub use term_info::TermInfo;
pub use term_stepper::{NumericTermStepper, TermStepper, TextTermStepper};
