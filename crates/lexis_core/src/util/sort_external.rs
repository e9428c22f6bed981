//! Bounded-memory external sort.
//!
//! [`SortExternal`] accepts items in any order through
//! [`feed`](SortExternal::feed). Whenever the items held in its cache add
//! up to the memory threshold, the cache is sorted and spilled into a
//! run: a stream of encoded items in a storage backend (memory by
//! default, a temporary file when [`SortConfig::spill_dir`] is set).
//!
//! After [`flip`](SortExternal::flip), [`fetch`](SortExternal::fetch)
//! merges the runs. Each run reads its items back in windows bounded by a
//! share of the parent's threshold, so memory stays bounded however many
//! items were fed. A run can itself be a whole `SortExternal` attached
//! with [`add_run`](SortExternal::add_run); such a nested engine merges
//! its own runs the same way.
//!
//! Ties go to the earliest source: runs are consulted in the order they
//! were created or attached, and the first of several equal heads wins.
//! Items that compare equal are otherwise not distinguished.
//!
//! ## Example
//!
//! ```rust
//! use lexis_core::{SortConfig, SortExternal};
//!
//! let mut sorter = SortExternal::new(SortConfig::new().mem_thresh(4));
//! for word in ["pear", "apple", "fig"] {
//!     sorter.feed(word.to_string()).unwrap();
//! }
//! sorter.flip().unwrap();
//! assert_eq!(sorter.fetch().unwrap().as_deref(), Some("apple"));
//! ```

use crate::config::SortConfig;
use crate::error::{CoreError, CoreResult};
use crate::store::{InStream, OutStream};
use crate::util::memory;
use lexis_storage::{FileBackend, InMemoryBackend, StorageBackend};
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// An item that can be sorted externally.
///
/// The [`Ord`] implementation is the sort order. `mem_size` is the amount
/// charged against the memory threshold while the item is held in memory.
pub trait SortItem: Ord + Sized {
    /// Memory charged for holding this item.
    fn mem_size(&self) -> usize;

    /// Appends the item's encoding to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    /// Decodes an item written by [`SortItem::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] if `bytes` is not a valid
    /// encoding.
    fn decode(bytes: &[u8]) -> CoreResult<Self>;
}

impl SortItem for Vec<u8> {
    fn mem_size(&self) -> usize {
        self.len()
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }

    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        Ok(bytes.to_vec())
    }
}

impl SortItem for String {
    fn mem_size(&self) -> usize {
        self.len()
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }

    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CoreError::invalid_format(format!("spilled string: {e}")))
    }
}

impl SortItem for u32 {
    fn mem_size(&self) -> usize {
        4
    }

    fn encode(&self, out: &mut Vec<u8>) {
        lexis_codec::put_u32_be(out, *self);
    }

    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        Ok(lexis_codec::get_u32_be(bytes)?)
    }
}

impl SortItem for u64 {
    fn mem_size(&self) -> usize {
        8
    }

    fn encode(&self, out: &mut Vec<u8>) {
        lexis_codec::put_u64_be(out, *self);
    }

    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        Ok(lexis_codec::get_u64_be(bytes)?)
    }
}

/// Removes a spill file when the run that owns it goes away.
#[derive(Debug)]
struct SpillFile {
    path: PathBuf,
}

impl Drop for SpillFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove spill file");
        }
    }
}

/// A sorted batch of items held in a storage backend.
pub struct SpilledRun<T> {
    input: InStream,
    remaining: u64,
    window: VecDeque<T>,
    mem_thresh: usize,
    // Dropped after `input` so the file is closed first.
    _spill_file: Option<SpillFile>,
}

impl<T> fmt::Debug for SpilledRun<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpilledRun")
            .field("input", &self.input)
            .field("remaining", &self.remaining)
            .field("window", &self.window.len())
            .field("mem_thresh", &self.mem_thresh)
            .finish()
    }
}

impl<T: SortItem> SpilledRun<T> {
    /// Writes already-sorted `items` into a new run. With `spill_dir`
    /// the run lives in a temporary file there, otherwise in memory.
    ///
    /// The run starts with a zero memory threshold; it must be given one
    /// with [`SpilledRun::set_mem_thresh`] before it can be read.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend can't be created or written.
    pub fn write(items: &[T], spill_dir: Option<&Path>) -> CoreResult<Self> {
        let (name, backend, spill_file): (String, Box<dyn StorageBackend>, _) = match spill_dir {
            Some(dir) => {
                let path = dir.join(format!("run-{}.spill", Uuid::new_v4()));
                let backend = FileBackend::open_with_create_dirs(&path)?;
                (
                    path.display().to_string(),
                    Box::new(backend),
                    Some(SpillFile { path }),
                )
            }
            None => ("run".to_string(), Box::new(InMemoryBackend::new()), None),
        };

        let mut out = OutStream::new(name.clone(), backend)?;
        let mut buf = Vec::new();
        for item in items {
            buf.clear();
            item.encode(&mut buf);
            let len = u32::try_from(buf.len()).map_err(|_| {
                CoreError::invalid_argument(format!("sort item too large: {} bytes", buf.len()))
            })?;
            out.write_c32(len)?;
            out.write_bytes(&buf)?;
        }
        let input = InStream::new(name, out.into_backend()?)?;

        Ok(Self {
            input,
            remaining: items.len() as u64,
            window: VecDeque::new(),
            mem_thresh: 0,
            _spill_file: spill_file,
        })
    }

    /// Sets how much memory a window of decoded items may take.
    pub fn set_mem_thresh(&mut self, mem_thresh: usize) {
        self.mem_thresh = mem_thresh;
    }

    /// Items not yet fetched.
    #[must_use]
    pub fn count(&self) -> usize {
        self.window.len() + self.remaining as usize
    }

    /// Decodes the next window of items. Returns the window size.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvariantViolation`] if the window still holds
    /// items or the memory threshold is zero, or an error if decoding
    /// fails.
    pub fn refill(&mut self) -> CoreResult<usize> {
        if !self.window.is_empty() {
            return Err(CoreError::invariant_violation(format!(
                "refill called but window contains {} items",
                self.window.len()
            )));
        }
        if self.mem_thresh == 0 {
            return Err(CoreError::invariant_violation(
                "refill called with a zero memory threshold",
            ));
        }

        let mut consumed = 0;
        while consumed < self.mem_thresh && self.remaining > 0 {
            let len = self.input.read_c32()? as usize;
            let item = T::decode(&self.input.read_bytes(len)?)?;
            consumed += item.mem_size();
            self.remaining -= 1;
            self.window.push_back(item);
        }
        Ok(self.window.len())
    }

    fn prime(&mut self) -> CoreResult<()> {
        if self.window.is_empty() && self.remaining > 0 {
            self.refill()?;
        }
        Ok(())
    }

    fn head(&self) -> Option<&T> {
        self.window.front()
    }

    fn fetch(&mut self) -> CoreResult<Option<T>> {
        self.prime()?;
        Ok(self.window.pop_front())
    }
}

/// A source of sorted items merged by [`SortExternal`].
#[derive(Debug)]
pub enum Run<T: SortItem> {
    /// Items spilled from a cache.
    Spilled(SpilledRun<T>),
    /// A whole engine attached with [`SortExternal::add_run`].
    Nested(Box<SortExternal<T>>),
}

impl<T: SortItem> Run<T> {
    /// Items not yet fetched.
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Self::Spilled(run) => run.count(),
            Self::Nested(sorter) => sorter.count(),
        }
    }

    fn set_mem_thresh(&mut self, mem_thresh: usize) {
        match self {
            Self::Spilled(run) => run.set_mem_thresh(mem_thresh),
            Self::Nested(sorter) => sorter.set_mem_thresh(mem_thresh),
        }
    }

    fn prime(&mut self) -> CoreResult<()> {
        match self {
            Self::Spilled(run) => run.prime(),
            Self::Nested(sorter) => sorter.prime(),
        }
    }

    fn head(&self) -> Option<&T> {
        match self {
            Self::Spilled(run) => run.head(),
            Self::Nested(sorter) => sorter.head(),
        }
    }

    fn fetch(&mut self) -> CoreResult<Option<T>> {
        match self {
            Self::Spilled(run) => run.fetch(),
            Self::Nested(sorter) => sorter.fetch(),
        }
    }
}

/// External merge sort over [`SortItem`]s.
#[derive(Debug)]
pub struct SortExternal<T: SortItem> {
    config: SortConfig,
    cache: Vec<T>,
    runs: Vec<Run<T>>,
    mem_consumed: usize,
    flipped: bool,
    next_run: Option<usize>,
}

impl<T: SortItem> SortExternal<T> {
    /// Creates an empty sorter in write mode.
    #[must_use]
    pub fn new(config: SortConfig) -> Self {
        Self {
            config,
            cache: Vec::new(),
            runs: Vec::new(),
            mem_consumed: 0,
            flipped: false,
            next_run: None,
        }
    }

    fn check_writable(&self, op: &str) -> CoreResult<()> {
        if self.flipped {
            Err(CoreError::invariant_violation(format!(
                "can't {op} after flip"
            )))
        } else {
            Ok(())
        }
    }

    /// Adds an item to the cache, spilling the cache once it reaches the
    /// memory threshold.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvariantViolation`] after
    /// [`flip`](Self::flip), or an error if a spill fails.
    pub fn feed(&mut self, item: T) -> CoreResult<()> {
        self.check_writable("feed")?;
        self.mem_consumed += item.mem_size();
        let want = self.cache.len() + 1;
        memory::grow(&mut self.cache, want);
        self.cache.push(item);
        if self.mem_consumed >= self.config.mem_thresh {
            self.flush()?;
        }
        Ok(())
    }

    /// Sorts the cache and spills it into a new run. Does nothing if the
    /// cache is empty.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvariantViolation`] after
    /// [`flip`](Self::flip), or an error if the spill fails.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.check_writable("flush")?;
        if self.cache.is_empty() {
            return Ok(());
        }
        self.sort_cache();
        let run = SpilledRun::write(&self.cache, self.config.spill_dir.as_deref())?;
        debug!(
            items = self.cache.len(),
            bytes = self.mem_consumed,
            run = self.runs.len(),
            "spilled sort cache"
        );
        self.runs.push(Run::Spilled(run));
        self.clear_cache();
        Ok(())
    }

    /// Attaches another sorter as a run. It is flipped along with this
    /// one if it hasn't been already.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvariantViolation`] after
    /// [`flip`](Self::flip).
    pub fn add_run(&mut self, run: SortExternal<T>) -> CoreResult<()> {
        self.check_writable("add a run")?;
        self.runs.push(Run::Nested(Box::new(run)));
        Ok(())
    }

    /// Switches to read mode: spills the cache, then divides half of the
    /// memory threshold among the runs.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvariantViolation`] if already flipped, or an
    /// error if the final spill fails.
    pub fn flip(&mut self) -> CoreResult<()> {
        self.flush()?;

        let num_runs = self.runs.len().max(1);
        // A run needs room for at least one item to refill.
        let run_mem_thresh = (self.config.mem_thresh / 2 / num_runs)
            .max(self.config.min_run_mem_thresh)
            .max(1);
        for run in &mut self.runs {
            run.set_mem_thresh(run_mem_thresh);
            if let Run::Nested(sorter) = run {
                if !sorter.is_flipped() {
                    sorter.flip()?;
                }
            }
        }

        self.flipped = true;
        debug!(runs = self.runs.len(), run_mem_thresh, "flipped external sort");
        Ok(())
    }

    fn check_flipped(&self, op: &str) -> CoreResult<()> {
        if self.flipped {
            Ok(())
        } else {
            Err(CoreError::invariant_violation(format!(
                "can't {op} before flip"
            )))
        }
    }

    fn prime(&mut self) -> CoreResult<()> {
        self.check_flipped("fetch")?;
        if self.next_run.is_some() {
            return Ok(());
        }
        for run in &mut self.runs {
            run.prime()?;
        }
        // `min_by` keeps the first of equal heads.
        self.next_run = self
            .runs
            .iter()
            .enumerate()
            .filter_map(|(idx, run)| run.head().map(|head| (idx, head)))
            .min_by(|a, b| a.1.cmp(b.1))
            .map(|(idx, _)| idx);
        Ok(())
    }

    fn head(&self) -> Option<&T> {
        self.next_run
            .and_then(|idx| self.runs.get(idx))
            .and_then(Run::head)
    }

    /// Removes and returns the smallest remaining item.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvariantViolation`] before
    /// [`flip`](Self::flip), or an error if a run can't be read.
    pub fn fetch(&mut self) -> CoreResult<Option<T>> {
        self.prime()?;
        let Some(idx) = self.next_run.take() else {
            return Ok(None);
        };
        self.runs[idx].fetch()
    }

    /// Returns the smallest remaining item without removing it.
    ///
    /// # Errors
    ///
    /// Same as [`fetch`](Self::fetch).
    pub fn peek(&mut self) -> CoreResult<Option<&T>> {
        self.prime()?;
        Ok(self.head())
    }

    /// Sets the memory threshold.
    pub fn set_mem_thresh(&mut self, mem_thresh: usize) {
        self.config.mem_thresh = mem_thresh;
    }

    /// The memory threshold.
    #[must_use]
    pub fn mem_thresh(&self) -> usize {
        self.config.mem_thresh
    }

    /// Sorts the cache in place. The sort is stable.
    pub fn sort_cache(&mut self) {
        self.cache.sort();
    }

    /// Items currently in the cache.
    #[must_use]
    pub fn peek_cache(&self) -> &[T] {
        &self.cache
    }

    /// Discards the cache and resets the memory counter.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.mem_consumed = 0;
    }

    /// Number of items in the cache.
    #[must_use]
    pub fn cache_count(&self) -> usize {
        self.cache.len()
    }

    /// Number of runs, spilled or attached.
    #[must_use]
    pub fn num_runs(&self) -> usize {
        self.runs.len()
    }

    /// Memory charged for the items in the cache.
    #[must_use]
    pub fn mem_consumed(&self) -> usize {
        self.mem_consumed
    }

    /// Returns true once the sorter is in read mode.
    #[must_use]
    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    /// Items not yet fetched, cached or in runs.
    #[must_use]
    pub fn count(&self) -> usize {
        self.cache.len() + self.runs.iter().map(Run::count).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bytes(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    fn drain<T: SortItem>(sorter: &mut SortExternal<T>) -> Vec<T> {
        let mut got = Vec::new();
        while let Some(item) = sorter.fetch().unwrap() {
            got.push(item);
        }
        got
    }

    // Deterministic Fisher-Yates driven by a xorshift generator.
    fn shuffle<T>(items: &mut [T], mut seed: u64) {
        for i in (1..items.len()).rev() {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let j = (seed % (i as u64 + 1)) as usize;
            items.swap(i, j);
        }
    }

    fn check_sort(sorted: Vec<Vec<u8>>, mem_thresh: usize) {
        let mut shuffled = sorted.clone();
        shuffle(&mut shuffled, 0x9e37_79b9_7f4a_7c15);
        let mut sorter = SortExternal::new(SortConfig::new().mem_thresh(mem_thresh));
        for item in shuffled {
            sorter.feed(item).unwrap();
        }
        sorter.flip().unwrap();
        assert_eq!(sorter.count(), sorted.len());
        assert_eq!(drain(&mut sorter), sorted);
        assert_eq!(sorter.count(), 0);
    }

    fn letters(text: &str) -> Vec<Vec<u8>> {
        text.chars()
            .map(|c| if c == '_' { Vec::new() } else { vec![c as u8] })
            .collect()
    }

    #[test]
    fn cache_spills_at_threshold_and_runs_merge() {
        let mut sorter = SortExternal::new(SortConfig::new().mem_thresh(4));
        sorter.feed(bytes("c")).unwrap();
        assert_eq!(sorter.cache_count(), 1);

        sorter.feed(bytes("b")).unwrap();
        sorter.feed(bytes("d")).unwrap();
        sorter.sort_cache();
        assert_eq!(sorter.peek_cache(), &[bytes("b"), bytes("c"), bytes("d")]);

        sorter.feed(bytes("a")).unwrap();
        assert_eq!(sorter.cache_count(), 0);
        assert_eq!(sorter.num_runs(), 1);

        let mut external = SortExternal::new(SortConfig::new().mem_thresh(0x100_0000));
        for s in ["x", "y", "z"] {
            external.feed(bytes(s)).unwrap();
        }
        sorter.add_run(external).unwrap();
        sorter.flip().unwrap();

        let got = drain(&mut sorter);
        let want: Vec<_> = ["a", "b", "c", "d", "x", "y", "z"].iter().map(|s| bytes(s)).collect();
        assert_eq!(got, want);
    }

    #[test]
    fn cleared_items_are_gone() {
        let mut sorter = SortExternal::new(SortConfig::new().mem_thresh(4));
        sorter.feed(bytes("c")).unwrap();
        sorter.clear_cache();
        assert_eq!(sorter.cache_count(), 0);
        assert_eq!(sorter.mem_consumed(), 0);

        sorter.feed(bytes("b")).unwrap();
        sorter.feed(bytes("a")).unwrap();
        sorter.flush().unwrap();
        sorter.flip().unwrap();
        assert_eq!(sorter.peek().unwrap(), Some(&bytes("a")));
        assert_eq!(drain(&mut sorter), vec![bytes("a"), bytes("b")]);
    }

    #[test]
    fn sort_letters() {
        let alphabet = "abcdefghijklmnopqrstuvwxyz";
        check_sort(letters(alphabet), 0x100_0000);
        check_sort(letters("aaabcdxxxxxxyy"), 0x100_0000);
        check_sort(letters(&format!("__{alphabet}")), 0x100_0000);
        check_sort(letters(alphabet), 30);
        check_sort(letters(alphabet), 1);
    }

    #[test]
    fn sort_nothing() {
        let mut sorter: SortExternal<Vec<u8>> = SortExternal::new(SortConfig::new());
        sorter.flip().unwrap();
        assert_eq!(sorter.fetch().unwrap(), None);
        assert_eq!(sorter.peek().unwrap(), None);
    }

    #[test]
    fn sort_packed_ints() {
        let sorted: Vec<Vec<u8>> = (0u32..11_001).map(|i| i.to_be_bytes().to_vec()).collect();
        check_sort(sorted, 5000);
    }

    #[test]
    fn sort_random_strings() {
        let mut seed = 42u64;
        let mut next = move || {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            (seed >> 33) as usize
        };
        let mut strings: Vec<Vec<u8>> = (0..1001)
            .map(|_| {
                let len = next() % 1200 + 1;
                (0..len).map(|_| next() as u8).collect()
            })
            .collect();
        strings.sort();
        check_sort(strings, 15_000);
    }

    #[test]
    fn small_run_windows_refill() {
        let mut sorter = SortExternal::new(
            SortConfig::new().mem_thresh(16).min_run_mem_thresh(8),
        );
        for i in (0u64..100).rev() {
            sorter.feed(i).unwrap();
        }
        assert_eq!(sorter.num_runs(), 50);
        sorter.flip().unwrap();
        assert_eq!(drain(&mut sorter), (0u64..100).collect::<Vec<_>>());
    }

    #[test]
    fn zero_run_floor_still_sorts() {
        let mut sorter = SortExternal::new(SortConfig::new().mem_thresh(1).min_run_mem_thresh(0));
        for s in ["c", "a", "b"] {
            sorter.feed(bytes(s)).unwrap();
        }
        assert_eq!(sorter.num_runs(), 3);
        sorter.flip().unwrap();
        assert_eq!(drain(&mut sorter), vec![bytes("a"), bytes("b"), bytes("c")]);
    }

    #[test]
    fn mode_violations_fail_loudly() {
        let mut sorter: SortExternal<u32> = SortExternal::new(SortConfig::new());
        assert!(sorter.fetch().unwrap_err().is_invariant_violation());
        assert!(sorter.peek().unwrap_err().is_invariant_violation());

        sorter.feed(3).unwrap();
        sorter.flip().unwrap();
        assert!(sorter.feed(1).unwrap_err().is_invariant_violation());
        assert!(sorter.flush().unwrap_err().is_invariant_violation());
        assert!(sorter.flip().unwrap_err().is_invariant_violation());
        assert!(sorter
            .add_run(SortExternal::new(SortConfig::new()))
            .unwrap_err()
            .is_invariant_violation());
        assert_eq!(sorter.fetch().unwrap(), Some(3));
    }

    #[test]
    fn refill_guards() {
        let mut run = SpilledRun::write(&[1u32, 2, 3], None).unwrap();
        assert!(run.refill().unwrap_err().is_invariant_violation());

        run.set_mem_thresh(4);
        assert_eq!(run.refill().unwrap(), 1);
        assert!(run.refill().unwrap_err().is_invariant_violation());
        assert_eq!(run.count(), 3);
    }

    #[test]
    fn ties_go_to_earlier_runs() {
        #[derive(Debug, PartialEq, Eq)]
        struct Tagged(u32, u8);
        impl PartialOrd for Tagged {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }
        impl Ord for Tagged {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                self.0.cmp(&other.0)
            }
        }
        impl SortItem for Tagged {
            fn mem_size(&self) -> usize {
                1
            }
            fn encode(&self, out: &mut Vec<u8>) {
                lexis_codec::put_u32_be(out, self.0);
                out.push(self.1);
            }
            fn decode(bytes: &[u8]) -> CoreResult<Self> {
                Ok(Tagged(lexis_codec::get_u32_be(&bytes[..4])?, bytes[4]))
            }
        }

        let mut sorter = SortExternal::new(SortConfig::new().mem_thresh(2));
        sorter.feed(Tagged(5, b'a')).unwrap();
        sorter.feed(Tagged(7, b'a')).unwrap();
        sorter.feed(Tagged(5, b'b')).unwrap();
        sorter.feed(Tagged(7, b'b')).unwrap();
        let tags: Vec<_> = drain_after_flip(&mut sorter).iter().map(|t| (t.0, t.1)).collect();
        assert_eq!(tags, vec![(5, b'a'), (5, b'b'), (7, b'a'), (7, b'b')]);
    }

    fn drain_after_flip<T: SortItem>(sorter: &mut SortExternal<T>) -> Vec<T> {
        sorter.flip().unwrap();
        drain(sorter)
    }

    #[test]
    fn spill_files_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let config = SortConfig::new().mem_thresh(8).spill_dir(dir.path().join("runs"));
        let mut sorter = SortExternal::new(config);
        for word in ["delta", "alpha", "echo", "bravo", "charlie"] {
            sorter.feed(word.to_string()).unwrap();
        }
        sorter.flip().unwrap();
        let spilled = std::fs::read_dir(dir.path().join("runs")).unwrap().count();
        assert_eq!(spilled, sorter.num_runs());
        assert_eq!(sorter.fetch().unwrap().as_deref(), Some("alpha"));

        drop(sorter);
        assert_eq!(std::fs::read_dir(dir.path().join("runs")).unwrap().count(), 0);
    }

    proptest! {
        #[test]
        fn output_is_sorted_for_any_threshold(
            items in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..6), 0..200),
            mem_thresh in 1usize..64,
        ) {
            let mut sorter = SortExternal::new(
                SortConfig::new().mem_thresh(mem_thresh).min_run_mem_thresh(1),
            );
            for item in items.clone() {
                sorter.feed(item).unwrap();
            }
            sorter.flip().unwrap();
            let got = drain(&mut sorter);
            let mut want = items;
            want.sort();
            prop_assert_eq!(got, want);
        }
    }
}
