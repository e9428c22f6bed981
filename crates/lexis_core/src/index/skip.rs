//! Skip records for long posting lists.
//!
//! A skip record is a `(doc_id, filepos)` pair stored as deltas against
//! the previous record, letting a reader jump into the middle of a posting
//! list. The stepper holds the absolute values; readers accumulate deltas
//! into it record by record.

use crate::error::{CoreError, CoreResult};
use std::fmt;
use std::io::{Read, Write};

/// Absolute position in a posting list, read and written as deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SkipStepper {
    doc_id: u32,
    filepos: u64,
}

impl SkipStepper {
    /// Creates a stepper at document 0, offset 0.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            doc_id: 0,
            filepos: 0,
        }
    }

    /// Current document id.
    #[must_use]
    pub const fn doc_id(&self) -> u32 {
        self.doc_id
    }

    /// Current posting-stream offset.
    #[must_use]
    pub const fn filepos(&self) -> u64 {
        self.filepos
    }

    /// Sets both absolute values.
    pub fn set_id_and_filepos(&mut self, doc_id: u32, filepos: u64) {
        self.doc_id = doc_id;
        self.filepos = filepos;
    }

    /// Writes the current position as deltas against the previous record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the current position is
    /// behind the previous one, or an error if the write fails.
    pub fn write_record<W: Write + ?Sized>(
        &self,
        out: &mut W,
        last_doc_id: u32,
        last_filepos: u64,
    ) -> CoreResult<()> {
        let delta_doc = self.doc_id.checked_sub(last_doc_id).ok_or_else(|| {
            CoreError::invalid_argument(format!(
                "skip doc id {} behind previous {last_doc_id}",
                self.doc_id
            ))
        })?;
        let delta_pos = self.filepos.checked_sub(last_filepos).ok_or_else(|| {
            CoreError::invalid_argument(format!(
                "skip file pointer {} behind previous {last_filepos}",
                self.filepos
            ))
        })?;
        lexis_codec::write_c32(out, delta_doc)?;
        lexis_codec::write_c64(out, delta_pos)?;
        Ok(())
    }

    /// Reads one record and adds its deltas to the current position.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] if the record is truncated,
    /// a varint overflows or the sums overflow.
    pub fn read_record<R: Read + ?Sized>(&mut self, input: &mut R) -> CoreResult<()> {
        let delta_doc =
            lexis_codec::read_c32(input).map_err(|e| CoreError::from_decode("skip record", e))?;
        let delta_pos =
            lexis_codec::read_c64(input).map_err(|e| CoreError::from_decode("skip record", e))?;
        self.doc_id = self
            .doc_id
            .checked_add(delta_doc)
            .ok_or_else(|| CoreError::invalid_format("skip doc id overflows"))?;
        self.filepos = self
            .filepos
            .checked_add(delta_pos)
            .ok_or_else(|| CoreError::invalid_format("skip file pointer overflows"))?;
        Ok(())
    }
}

impl fmt::Display for SkipStepper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skip doc: {} file pointer: {}", self.doc_id, self.filepos)
    }
}
