//! Per-term statistics and file positions.

/// Where a term's data lives and how many documents contain it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TermInfo {
    /// Number of documents containing the term.
    pub doc_freq: u32,
    /// Start of the term's postings in the posting stream.
    pub post_filepos: u64,
    /// Start of the term's skip records. Only meaningful when `doc_freq`
    /// reaches the skip interval.
    pub skip_filepos: u64,
    /// Position of the term in the main lexicon stream.
    pub lex_filepos: u64,
}

impl TermInfo {
    /// Creates term info with the given document frequency and zeroed
    /// positions.
    #[must_use]
    pub const fn new(doc_freq: u32) -> Self {
        Self {
            doc_freq,
            post_filepos: 0,
            skip_filepos: 0,
            lex_filepos: 0,
        }
    }

    /// Zeroes every field.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
