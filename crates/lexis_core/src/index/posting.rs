//! Posting records and the per-term posting stream.
//!
//! Each record stores the document id as a delta against the previous
//! posting of the same term. The low bit of the first varint flags a
//! frequency of one, so the common case costs a single varint:
//!
//! ```text
//! freq == 1:  C32((delta << 1) | 1)            payload
//! freq  > 1:  C32(delta << 1)      C32(freq)   payload
//! ```
//!
//! Payload bytes are opaque here; their length comes from a
//! [`PayloadLen`] agreed on by writer and reader.

use crate::error::{CoreError, CoreResult};
use crate::index::skip::SkipStepper;
use crate::index::term_info::TermInfo;
use crate::store::{InStream, OutStream};
use std::io::{Read, Write};

/// Largest delta that still fits once shifted left by one bit.
const MAX_DELTA: u32 = u32::MAX >> 1;

/// How many payload bytes follow each posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadLen {
    /// The same number of bytes for every posting.
    Fixed(usize),
    /// This many bytes per occurrence, i.e. multiplied by the frequency.
    PerOccurrence(usize),
    /// No payload.
    #[default]
    None,
}

impl PayloadLen {
    /// Payload size of a posting with frequency `freq`.
    #[must_use]
    pub fn bytes_for(self, freq: u32) -> usize {
        match self {
            Self::Fixed(n) => n,
            Self::PerOccurrence(n) => n.saturating_mul(freq as usize),
            Self::None => 0,
        }
    }
}

/// One document's entry in a term's posting list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPosting {
    /// Absolute document id.
    pub doc_id: u32,
    /// Number of occurrences in the document, at least 1.
    pub freq: u32,
    /// Opaque auxiliary bytes (positions, boosts, ...).
    pub payload: Vec<u8>,
}

impl RawPosting {
    /// Creates a posting.
    #[must_use]
    pub fn new(doc_id: u32, freq: u32, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            doc_id,
            freq,
            payload: payload.into(),
        }
    }
}

fn delta_for(prev_doc_id: u32, doc_id: u32, freq: u32) -> CoreResult<u32> {
    if freq == 0 {
        return Err(CoreError::invalid_argument(format!(
            "posting for doc {doc_id} has frequency 0"
        )));
    }
    if doc_id <= prev_doc_id {
        return Err(CoreError::invalid_argument(format!(
            "doc id {doc_id} not greater than previous {prev_doc_id}"
        )));
    }
    let delta = doc_id - prev_doc_id;
    if delta > MAX_DELTA {
        return Err(CoreError::invalid_argument(format!(
            "doc id delta {delta} too large"
        )));
    }
    Ok(delta)
}

fn read_c32<R: Read + ?Sized>(input: &mut R) -> CoreResult<u32> {
    lexis_codec::read_c32(input).map_err(|e| CoreError::from_decode("posting", e))
}

/// Encodes one posting into `out`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidArgument`] if `freq` is 0, if `doc_id` is
/// not greater than `prev_doc_id`, or if the delta does not fit in 31 bits.
pub fn write_posting<W: Write + ?Sized>(
    out: &mut W,
    prev_doc_id: u32,
    doc_id: u32,
    freq: u32,
    payload: &[u8],
) -> CoreResult<()> {
    let delta = delta_for(prev_doc_id, doc_id, freq)?;
    if freq == 1 {
        lexis_codec::write_c32(out, (delta << 1) | 1)?;
    } else {
        lexis_codec::write_c32(out, delta << 1)?;
        lexis_codec::write_c32(out, freq)?;
    }
    out.write_all(payload)?;
    Ok(())
}

/// Encodes one posting into a fresh buffer.
///
/// # Errors
///
/// See [`write_posting`].
pub fn encode_posting(
    prev_doc_id: u32,
    doc_id: u32,
    freq: u32,
    payload: &[u8],
) -> CoreResult<Vec<u8>> {
    let mut out = Vec::with_capacity(2 * lexis_codec::MAX_C32_LEN + payload.len());
    write_posting(&mut out, prev_doc_id, doc_id, freq, payload)?;
    Ok(out)
}

/// Decodes one posting that follows `prev_doc_id`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidFormat`] if the record is truncated, if a
/// varint overflows, if an explicit frequency is 0, or if the document id
/// doesn't advance or overflows.
pub fn decode_posting<R: Read + ?Sized>(
    prev_doc_id: u32,
    input: &mut R,
    payload_len: PayloadLen,
) -> CoreResult<RawPosting> {
    let doc_code = read_c32(&mut *input)?;
    let freq = if doc_code & 1 == 1 {
        1
    } else {
        let freq = read_c32(&mut *input)?;
        if freq == 0 {
            return Err(CoreError::invalid_format("posting with frequency 0"));
        }
        freq
    };
    let delta = doc_code >> 1;
    if delta == 0 {
        return Err(CoreError::invalid_format(format!(
            "posting doesn't advance past doc {prev_doc_id}"
        )));
    }
    let doc_id = prev_doc_id
        .checked_add(delta)
        .ok_or_else(|| CoreError::invalid_format("posting doc id overflows"))?;
    // Read through `take` so a corrupt frequency can't force a huge allocation.
    let want = payload_len.bytes_for(freq);
    let mut payload = Vec::new();
    Read::take(&mut *input, want as u64).read_to_end(&mut payload)?;
    if payload.len() != want {
        return Err(CoreError::invalid_format(format!(
            "truncated payload for doc {doc_id}"
        )));
    }
    Ok(RawPosting {
        doc_id,
        freq,
        payload,
    })
}

/// Writes the posting lists of consecutive terms to one stream.
#[derive(Debug)]
pub struct PostingWriter {
    out: OutStream,
    payload_len: PayloadLen,
    last_doc_id: u32,
}

impl PostingWriter {
    /// Creates a writer over `out`.
    #[must_use]
    pub fn new(out: OutStream, payload_len: PayloadLen) -> Self {
        Self {
            out,
            payload_len,
            last_doc_id: 0,
        }
    }

    /// Begins a new term: resets the delta baseline and records where the
    /// term's postings start.
    pub fn start_term(&mut self, tinfo: &mut TermInfo) {
        self.last_doc_id = 0;
        tinfo.post_filepos = self.out.tell();
    }

    /// Appends a posting to the current term.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the posting is out of
    /// order, has frequency 0, or its payload has the wrong length.
    pub fn write_posting(&mut self, posting: &RawPosting) -> CoreResult<()> {
        let want = self.payload_len.bytes_for(posting.freq);
        if posting.payload.len() != want {
            return Err(CoreError::invalid_argument(format!(
                "payload for doc {} is {} bytes, expected {want}",
                posting.doc_id,
                posting.payload.len()
            )));
        }
        write_posting(
            &mut self.out,
            self.last_doc_id,
            posting.doc_id,
            posting.freq,
            &posting.payload,
        )?;
        self.last_doc_id = posting.doc_id;
        Ok(())
    }

    /// Points `tinfo` at the current end of the stream.
    pub fn update_skip_info(&mut self, tinfo: &mut TermInfo) {
        tinfo.post_filepos = self.out.tell();
    }

    /// The last document written and the offset after it, as a skip
    /// target for readers.
    #[must_use]
    pub fn skip_point(&self) -> SkipStepper {
        let mut stepper = SkipStepper::new();
        stepper.set_id_and_filepos(self.last_doc_id, self.out.tell());
        stepper
    }

    /// Current stream offset.
    #[must_use]
    pub fn tell(&self) -> u64 {
        self.out.tell()
    }

    /// Flushes and returns the underlying stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn finish(mut self) -> CoreResult<OutStream> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Reads one term's postings at a time.
#[derive(Debug)]
pub struct PostingReader {
    input: InStream,
    payload_len: PayloadLen,
    last_doc_id: u32,
    doc_freq: u32,
    remaining: u32,
}

impl PostingReader {
    /// Creates a reader over `input`.
    #[must_use]
    pub fn new(input: InStream, payload_len: PayloadLen) -> Self {
        Self {
            input,
            payload_len,
            last_doc_id: 0,
            doc_freq: 0,
            remaining: 0,
        }
    }

    /// Positions the reader at the start of a term's postings.
    ///
    /// # Errors
    ///
    /// Returns an error if `post_filepos` is past the end of the stream.
    pub fn seek_term(&mut self, tinfo: &TermInfo) -> CoreResult<()> {
        self.input.seek(tinfo.post_filepos)?;
        self.last_doc_id = 0;
        self.doc_freq = tinfo.doc_freq;
        self.remaining = tinfo.doc_freq;
        Ok(())
    }

    /// Jumps to a skip point inside the current term. `consumed` is the
    /// number of the term's postings that precede the skip point.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the jump would leave the
    /// term, or an error if the offset is past the end of the stream.
    pub fn jump(&mut self, skip: &SkipStepper, consumed: u32) -> CoreResult<()> {
        if skip.doc_id() < self.last_doc_id || skip.filepos() < self.input.tell() {
            return Err(CoreError::invalid_argument(format!(
                "can't jump backwards to {skip}"
            )));
        }
        let remaining = self.doc_freq.checked_sub(consumed).ok_or_else(|| {
            CoreError::invalid_argument(format!(
                "jump past {consumed} postings leaves the term"
            ))
        })?;
        self.input.seek(skip.filepos())?;
        self.last_doc_id = skip.doc_id();
        self.remaining = remaining;
        Ok(())
    }

    /// Returns the next posting of the current term, or `None` when the
    /// term is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is truncated or corrupt.
    pub fn next(&mut self) -> CoreResult<Option<RawPosting>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let posting = decode_posting(self.last_doc_id, &mut self.input, self.payload_len)?;
        self.last_doc_id = posting.doc_id;
        self.remaining -= 1;
        Ok(Some(posting))
    }

    /// Postings left in the current term.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}
