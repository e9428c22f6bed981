//! Cross-module integration test helpers.
//!
//! Provides helpers that drive several Lexis components together: posting
//! streams with skip points, draining sorters, and model checks used by
//! the property tests below.

use lexis_core::index::{PayloadLen, PostingReader, PostingWriter, RawPosting, SkipStepper};
use lexis_core::store::{InStream, OutStream};
use lexis_core::{CoreResult, SortExternal, SortItem, TermInfo};
use lexis_storage::Folder;

/// Path of the posting stream written by [`write_term_postings`].
pub const POSTINGS_FILE: &str = "postings-1.dat";

/// A skip point and the number of postings before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipPoint {
    /// Doc id and file position to resume from.
    pub stepper: SkipStepper,
    /// Postings of the term preceding the skip point.
    pub consumed: u32,
}

/// Writes one term's postings to [`POSTINGS_FILE`], recording a skip point
/// before every `skip_interval`th posting.
pub fn write_term_postings(
    folder: &dyn Folder,
    payload_len: PayloadLen,
    postings: &[RawPosting],
    skip_interval: usize,
) -> CoreResult<(TermInfo, Vec<SkipPoint>)> {
    let mut writer = PostingWriter::new(OutStream::open(folder, POSTINGS_FILE)?, payload_len);
    let mut tinfo = TermInfo::new(postings.len() as u32);
    writer.start_term(&mut tinfo);
    let mut skips = Vec::new();
    for (i, posting) in postings.iter().enumerate() {
        if i > 0 && skip_interval > 0 && i % skip_interval == 0 {
            skips.push(SkipPoint {
                stepper: writer.skip_point(),
                consumed: i as u32,
            });
        }
        writer.write_posting(posting)?;
    }
    writer.finish()?;
    Ok((tinfo, skips))
}

/// Reads a term's postings, optionally starting at a skip point.
pub fn read_term_postings(
    folder: &dyn Folder,
    payload_len: PayloadLen,
    tinfo: &TermInfo,
    skip: Option<&SkipPoint>,
) -> CoreResult<Vec<RawPosting>> {
    let mut reader = PostingReader::new(InStream::open(folder, POSTINGS_FILE)?, payload_len);
    reader.seek_term(tinfo)?;
    if let Some(skip) = skip {
        reader.jump(&skip.stepper, skip.consumed)?;
    }
    let mut out = Vec::new();
    while let Some(posting) = reader.next()? {
        out.push(posting);
    }
    Ok(out)
}

/// Flips `sorter` if needed and fetches every item.
pub fn drain_sorter<T: SortItem>(sorter: &mut SortExternal<T>) -> CoreResult<Vec<T>> {
    if !sorter.is_flipped() {
        sorter.flip()?;
    }
    let mut out = Vec::with_capacity(sorter.count());
    while let Some(item) = sorter.fetch()? {
        out.push(item);
    }
    Ok(out)
}
