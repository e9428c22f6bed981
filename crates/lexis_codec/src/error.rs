//! Error types for the codec crate.

use std::io;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The underlying reader or writer failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Input ended in the middle of a value.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// A compressed integer did not fit in its target width.
    #[error("compressed integer overflows {bits} bits")]
    VarintOverflow {
        /// Width of the target integer.
        bits: u32,
    },

    /// Unsupported bit width for packed ordinals.
    #[error("unsupported ordinal width: {width}")]
    InvalidWidth {
        /// The requested width in bits.
        width: u32,
    },
}

impl CodecError {
    /// Maps `UnexpectedEof` I/O errors onto [`CodecError::UnexpectedEof`].
    pub(crate) fn from_read(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::UnexpectedEof
        } else {
            Self::Io(e)
        }
    }
}
