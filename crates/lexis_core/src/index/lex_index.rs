//! Sparse lexicon index.
//!
//! Two files per field make up the index:
//!
//! - `<seg>/lexicon-<n>.ix`: one entry every `index_interval` terms. An
//!   entry is a key frame followed by `C32 doc_freq`, `C64 post_filepos`,
//!   `C64 skip_filepos` (only when `doc_freq >= skip_interval`) and
//!   `C64 lex_filepos`.
//! - `<seg>/lexicon-<n>.ixix`: the `.ix` offset of every entry as a
//!   big-endian `u64`, loaded whole at open time.
//!
//! Entry `k` describes term number `index_interval * k - 1`, the term just
//! before each interval boundary. Entry 0 is a sentinel holding the
//! smallest value of the field's kind, so a seek always lands on an entry
//! and `term_number` reports -1 there. Its `lex_filepos` points at the
//! first term of the main lexicon, which is where a linear scan would
//! start.

use crate::error::{CoreError, CoreResult};
use crate::index::segment::Segment;
use crate::index::term_info::TermInfo;
use crate::index::term_stepper::TermStepper;
use crate::plan::{FieldType, Schema, Value};
use crate::store::{InStream, OutStream};
use lexis_storage::Folder;
use std::cmp::Ordering;
use tracing::debug;

fn ix_paths(segment: &Segment, field_num: u32) -> (String, String) {
    (
        segment.file_path(&format!("lexicon-{field_num}.ixix")),
        segment.file_path(&format!("lexicon-{field_num}.ix")),
    )
}

fn lookup_field(schema: &Schema, segment: &Segment, field: &str) -> CoreResult<(FieldType, u32)> {
    let field_type = *schema
        .fetch_type(field)
        .ok_or_else(|| CoreError::missing_field(field))?;
    match segment.field_num(field) {
        0 => Err(CoreError::missing_field(field)),
        num => Ok((field_type, num)),
    }
}

/// Binary-searchable reader over a field's sparse lexicon index.
#[derive(Debug)]
pub struct LexIndex {
    field: String,
    field_type: FieldType,
    term_stepper: Box<dyn TermStepper>,
    ix_in: InStream,
    offsets: Vec<u64>,
    tinfo: TermInfo,
    tick: usize,
    index_interval: u32,
    skip_interval: u32,
}

impl LexIndex {
    /// Opens the lexicon index of `field` in `segment`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingField`] if the schema or the segment
    /// doesn't know the field, an error if either file can't be opened,
    /// and [`CoreError::InvalidFormat`] if the offsets are not strictly
    /// increasing or point past the end of the `.ix` file.
    pub fn open(
        schema: &Schema,
        folder: &dyn Folder,
        segment: &Segment,
        field: &str,
    ) -> CoreResult<Self> {
        let (field_type, field_num) = lookup_field(schema, segment, field)?;
        let (ixix_file, ix_file) = ix_paths(segment, field_num);

        let mut ixix_in = InStream::open(folder, &ixix_file)?;
        let ix_in = InStream::open(folder, &ix_file)?;
        let offsets = lexis_codec::decode_u64_array(&ixix_in.read_to_end_bytes()?);

        if offsets.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(CoreError::invalid_format(format!(
                "offsets in '{ixix_file}' are not strictly increasing"
            )));
        }
        if let Some(&last) = offsets.last() {
            if last >= ix_in.length() {
                return Err(CoreError::invalid_format(format!(
                    "offset {last} in '{ixix_file}' is past the end of '{ix_file}'"
                )));
            }
        }

        let arch = schema.architecture();
        debug!(field, entries = offsets.len(), "opened lexicon index");
        Ok(Self {
            field: field.to_string(),
            field_type,
            term_stepper: field_type.make_term_stepper(),
            ix_in,
            offsets,
            tinfo: TermInfo::default(),
            tick: 0,
            index_interval: arch.index_interval,
            skip_interval: arch.skip_interval,
        })
    }

    /// Name of the indexed field.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Number of entries in the index.
    #[must_use]
    pub fn size(&self) -> usize {
        self.offsets.len()
    }

    /// The entry the last seek landed on.
    #[must_use]
    pub fn tick(&self) -> usize {
        self.tick
    }

    /// Term number of the current entry: `index_interval * tick - 1`.
    #[must_use]
    pub fn term_number(&self) -> i64 {
        i64::from(self.index_interval) * self.tick as i64 - 1
    }

    /// The term at the current entry. `None` before any term, i.e. at
    /// tick 0.
    #[must_use]
    pub fn current_term(&self) -> Option<&Value> {
        if self.tick == 0 {
            None
        } else {
            self.term_stepper.value()
        }
    }

    /// Term info of the current entry.
    #[must_use]
    pub fn current_term_info(&self) -> &TermInfo {
        &self.tinfo
    }

    /// Positions the index at the greatest entry whose term is `<=
    /// target`, or at tick 0 if `target` is `None` or precedes every
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] if `target` is not of the
    /// field's kind, or an error if an entry can't be decoded.
    pub fn seek(&mut self, target: Option<&Value>) -> CoreResult<()> {
        if self.offsets.is_empty() {
            self.tick = 0;
            self.tinfo.reset();
            self.term_stepper.reset();
            return Ok(());
        }
        let Some(target) = target else {
            self.tick = 0;
            return self.read_entry();
        };
        self.field_type.check_value(target)?;

        // The first term may equal the sentinel key, so ties resolve to the
        // highest matching tick.
        let mut lo: i64 = 0;
        let mut hi: i64 = self.offsets.len() as i64 - 1;
        while hi >= lo {
            let mid = lo + (hi - lo) / 2;
            self.read_key_frame(mid as usize)?;
            let value = self.term_stepper.value().ok_or_else(|| {
                CoreError::invalid_format(format!("empty key frame at tick {mid}"))
            })?;
            match self.field_type.compare_values(target, value)? {
                Ordering::Less => hi = mid - 1,
                Ordering::Equal | Ordering::Greater => lo = mid + 1,
            }
        }

        self.tick = hi.max(0) as usize;
        self.read_entry()
    }

    fn read_key_frame(&mut self, tick: usize) -> CoreResult<()> {
        let offset = self.offsets[tick];
        self.ix_in.seek(offset)?;
        self.term_stepper.read_key_frame(&mut self.ix_in)
    }

    fn read_entry(&mut self) -> CoreResult<()> {
        self.read_key_frame(self.tick)?;
        let input = &mut self.ix_in;
        let doc_freq = input.read_c32()?;
        self.tinfo = TermInfo {
            doc_freq,
            post_filepos: input.read_c64()?,
            skip_filepos: if doc_freq >= self.skip_interval {
                input.read_c64()?
            } else {
                0
            },
            lex_filepos: input.read_c64()?,
        };
        Ok(())
    }
}

/// Writes a field's sparse lexicon index while its terms stream past.
#[derive(Debug)]
pub struct LexIndexWriter {
    field: String,
    field_type: FieldType,
    term_stepper: Box<dyn TermStepper>,
    ix_out: OutStream,
    ixix_out: OutStream,
    index_interval: u32,
    skip_interval: u32,
    count: u64,
    last_term: Option<Value>,
    last_tinfo: TermInfo,
}

impl LexIndexWriter {
    /// Creates the index files of `field` in `segment`, making the segment
    /// directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingField`] if the schema or segment doesn't
    /// know the field, [`CoreError::InvalidArgument`] for a zero index
    /// interval, or an error if the files can't be created.
    pub fn open(
        schema: &Schema,
        folder: &dyn Folder,
        segment: &Segment,
        field: &str,
    ) -> CoreResult<Self> {
        let (field_type, field_num) = lookup_field(schema, segment, field)?;
        let arch = schema.architecture();
        if arch.index_interval == 0 {
            return Err(CoreError::invalid_argument("index interval must be positive"));
        }
        if !folder.is_directory(segment.name()) {
            folder.mkdir(segment.name())?;
        }
        let (ixix_file, ix_file) = ix_paths(segment, field_num);
        Ok(Self {
            field: field.to_string(),
            field_type,
            term_stepper: field_type.make_term_stepper(),
            ix_out: OutStream::open(folder, &ix_file)?,
            ixix_out: OutStream::open(folder, &ixix_file)?,
            index_interval: arch.index_interval,
            skip_interval: arch.skip_interval,
            count: 0,
            last_term: None,
            last_tinfo: TermInfo::default(),
        })
    }

    /// Records the next term of the field. Terms must arrive in strictly
    /// increasing order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] for a term of another kind,
    /// [`CoreError::InvalidArgument`] for an out-of-order term, or an error
    /// if a write fails.
    pub fn add_term(&mut self, term: &Value, tinfo: &TermInfo) -> CoreResult<()> {
        self.field_type.check_value(term)?;
        if let Some(last) = &self.last_term {
            if term <= last {
                return Err(CoreError::invalid_argument(format!(
                    "term {term:?} of '{}' doesn't follow {last:?}",
                    self.field
                )));
            }
        }

        if self.count % u64::from(self.index_interval) == 0 {
            let key = self
                .last_term
                .clone()
                .unwrap_or_else(|| Value::min_of(self.field_type.primitive_kind()));
            let entry = TermInfo {
                lex_filepos: tinfo.lex_filepos,
                ..self.last_tinfo
            };
            self.write_entry(&key, &entry)?;
        }

        self.last_term = Some(term.clone());
        self.last_tinfo = *tinfo;
        self.count += 1;
        Ok(())
    }

    fn write_entry(&mut self, key: &Value, tinfo: &TermInfo) -> CoreResult<()> {
        self.ixix_out.write_u64_be(self.ix_out.tell())?;
        self.term_stepper.write_key_frame(&mut self.ix_out, key)?;
        self.ix_out.write_c32(tinfo.doc_freq)?;
        self.ix_out.write_c64(tinfo.post_filepos)?;
        if tinfo.doc_freq >= self.skip_interval {
            self.ix_out.write_c64(tinfo.skip_filepos)?;
        }
        self.ix_out.write_c64(tinfo.lex_filepos)?;
        Ok(())
    }

    /// Number of terms added so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Flushes both files and returns the number of terms seen.
    ///
    /// # Errors
    ///
    /// Returns an error if a flush fails.
    pub fn finish(mut self) -> CoreResult<u64> {
        self.ix_out.flush()?;
        self.ixix_out.flush()?;
        debug!(field = %self.field, terms = self.count, "wrote lexicon index");
        Ok(self.count)
    }
}
