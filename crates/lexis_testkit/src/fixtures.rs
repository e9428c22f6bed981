//! Test fixtures and index helpers.
//!
//! Provides folders with automatic cleanup, a scriptable process table
//! for lock tests, and builders that write small lexicons and sort caches.

use lexis_core::index::{SortReader, SortWriter};
use lexis_core::store::ProcessTable;
use lexis_core::{
    Architecture, CoreResult, FieldType, LexIndex, LexIndexWriter, LockConfig, LockFileLock,
    PrimitiveKind, Schema, Segment, SortConfig, TermInfo, Value,
};
use lexis_storage::{Folder, FsFolder, RamFolder};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Installs a `tracing` subscriber that writes to the test output.
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A folder with automatic cleanup.
pub struct TestFolder {
    folder: Arc<dyn Folder>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestFolder {
    /// Creates an in-memory folder.
    pub fn memory() -> Self {
        Self {
            folder: Arc::new(RamFolder::new()),
            _temp_dir: None,
        }
    }

    /// Creates a folder backed by a temporary directory.
    pub fn disk() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let folder = FsFolder::open(temp_dir.path()).expect("Failed to open folder");
        Self {
            folder: Arc::new(folder),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Borrows the folder.
    pub fn folder(&self) -> &dyn Folder {
        self.folder.as_ref()
    }

    /// Returns a shared handle to the folder.
    pub fn shared(&self) -> Arc<dyn Folder> {
        Arc::clone(&self.folder)
    }

    /// Returns the directory path if disk-based, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self._temp_dir.as_ref().map(|d| d.path())
    }
}

/// Runs a test against both an in-memory and an on-disk folder.
pub fn with_each_folder<F>(mut f: F)
where
    F: FnMut(&TestFolder),
{
    f(&TestFolder::memory());
    f(&TestFolder::disk());
}

/// A process table whose pid and set of live processes are scripted.
///
/// Handles made with [`FakeProcesses::as_pid`] share the live set, so
/// several simulated processes can contend for one lock.
#[derive(Debug, Clone)]
pub struct FakeProcesses {
    pid: u32,
    alive: Arc<Mutex<HashSet<u32>>>,
}

impl FakeProcesses {
    /// Creates a table for process `pid`, which starts out alive.
    pub fn new(pid: u32) -> Self {
        let alive = Arc::new(Mutex::new(HashSet::from([pid])));
        Self { pid, alive }
    }

    /// Returns a handle for another live process sharing this table.
    pub fn as_pid(&self, pid: u32) -> Self {
        self.alive.lock().insert(pid);
        Self {
            pid,
            alive: Arc::clone(&self.alive),
        }
    }

    /// Marks `pid` as dead.
    pub fn kill(&self, pid: u32) {
        self.alive.lock().remove(&pid);
    }

    /// Returns the pid this handle answers for.
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl ProcessTable for FakeProcesses {
    fn current_pid(&self) -> u32 {
        self.pid
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.alive.lock().contains(&pid)
    }
}

/// Polling settings short enough for tests.
pub fn fast_lock_config() -> LockConfig {
    LockConfig::new()
        .timeout(Duration::from_millis(50))
        .interval(Duration::from_millis(5))
}

/// Creates a lock held on behalf of `procs`'s process.
pub fn lock_as(
    folder: Arc<dyn Folder>,
    name: &str,
    host: &str,
    procs: &FakeProcesses,
) -> CoreResult<LockFileLock> {
    LockFileLock::with_processes(
        folder,
        name,
        host,
        fast_lock_config(),
        Arc::new(procs.clone()),
    )
}

/// Field name used by the builders.
pub const FIXTURE_FIELD: &str = "term";

/// A sorted term list and the schema and segment to write it under.
#[derive(Debug, Clone)]
pub struct LexiconFixture {
    /// Schema holding [`FIXTURE_FIELD`].
    pub schema: Schema,
    /// Segment the lexicon is written into.
    pub segment: Segment,
    /// Terms in strictly increasing order.
    pub terms: Vec<Value>,
}

impl LexiconFixture {
    /// Creates a fixture for a text field.
    pub fn text(index_interval: u32, terms: &[&str]) -> Self {
        let terms = terms.iter().map(|t| Value::from(*t)).collect();
        Self::new(PrimitiveKind::Text, index_interval, terms)
    }

    /// Creates a fixture for a 64-bit integer field.
    pub fn int64(index_interval: u32, terms: &[i64]) -> Self {
        let terms = terms.iter().map(|t| Value::Int64(*t)).collect();
        Self::new(PrimitiveKind::Int64, index_interval, terms)
    }

    /// Creates a fixture for terms of `kind`.
    pub fn new(kind: PrimitiveKind, index_interval: u32, terms: Vec<Value>) -> Self {
        let arch = Architecture::new()
            .index_interval(index_interval)
            .skip_interval(4);
        let mut schema = Schema::new(arch);
        schema.spec_field(FIXTURE_FIELD, FieldType::new(kind));
        let mut segment = Segment::new("seg_1").expect("valid segment name");
        segment.add_field(FIXTURE_FIELD);
        Self {
            schema,
            segment,
            terms,
        }
    }

    /// Synthetic term info for term number `i`, distinct per term.
    pub fn term_info(i: usize) -> TermInfo {
        let i = i as u64;
        TermInfo {
            doc_freq: (i % 7) as u32 + 1,
            post_filepos: i * 11,
            skip_filepos: i * 5 + 1,
            lex_filepos: i * 13 + 2,
        }
    }

    /// Writes the lexicon index and opens it.
    pub fn build(&self, folder: &dyn Folder) -> CoreResult<LexIndex> {
        let mut writer = LexIndexWriter::open(&self.schema, folder, &self.segment, FIXTURE_FIELD)?;
        for (i, term) in self.terms.iter().enumerate() {
            writer.add_term(term, &Self::term_info(i))?;
        }
        writer.finish()?;
        LexIndex::open(&self.schema, folder, &self.segment, FIXTURE_FIELD)
    }

    /// The tick a seek for `target` should land on: the last entry whose
    /// term is `<= target`, or 0.
    pub fn expected_tick(&self, target: &Value) -> usize {
        let interval = self.schema.architecture().index_interval as usize;
        let size = self.terms.len().div_ceil(interval);
        (1..size)
            .take_while(|k| &self.terms[interval * k - 1] <= target)
            .last()
            .unwrap_or(0)
    }
}

/// Writes one sortable column into a fresh segment and opens a reader.
///
/// `values[i]` is the value of document `i + 1`; `None` leaves the
/// document without a value.
pub fn build_sort_segment(
    folder: Arc<dyn Folder>,
    kind: PrimitiveKind,
    values: &[Option<Value>],
    config: SortConfig,
) -> CoreResult<SortReader> {
    let mut schema = Schema::new(Architecture::default());
    schema.spec_field(FIXTURE_FIELD, FieldType::new(kind).sortable(true));
    let mut segment = Segment::new("seg_1")?;
    segment.set_doc_max(values.len() as u32);

    let mut writer = SortWriter::new(schema.clone(), config);
    for (i, value) in values.iter().enumerate() {
        writer.add_value(FIXTURE_FIELD, i as u32 + 1, value.clone())?;
    }
    writer.finish(folder.as_ref(), &mut segment)?;
    segment.write_file(folder.as_ref())?;

    let segment = Segment::read_file(folder.as_ref(), "seg_1")?;
    SortReader::open(Arc::new(schema), folder, segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folders_are_usable() {
        with_each_folder(|folder| {
            folder.folder().spew_file("a", b"x").unwrap();
            assert_eq!(folder.folder().slurp_file("a").unwrap(), b"x");
        });
        assert!(TestFolder::memory().path().is_none());
        assert!(TestFolder::disk().path().is_some());
    }

    #[test]
    fn fake_processes_share_liveness() {
        let first = FakeProcesses::new(100);
        let second = first.as_pid(200);
        assert!(second.is_alive(100));
        first.kill(200);
        assert!(!first.is_alive(200));
        assert_eq!(second.current_pid(), 200);
    }

    #[test]
    fn expected_tick_model() {
        let lexicon = LexiconFixture::text(2, &["b", "d", "f", "h", "j"]);
        // Entries: 0 sentinel, 1 holds "d", 2 holds "h".
        assert_eq!(lexicon.expected_tick(&"a".into()), 0);
        assert_eq!(lexicon.expected_tick(&"d".into()), 1);
        assert_eq!(lexicon.expected_tick(&"g".into()), 1);
        assert_eq!(lexicon.expected_tick(&"z".into()), 2);
    }

    #[test]
    fn sort_segment_builder_round_trips() {
        let folder = TestFolder::memory();
        let values = vec![Some(Value::Int64(5)), None, Some(Value::Int64(-1))];
        let reader =
            build_sort_segment(folder.shared(), PrimitiveKind::Int64, &values, SortConfig::default())
                .unwrap();
        let cache = reader.fetch_sort_cache(FIXTURE_FIELD).unwrap().unwrap();
        assert_eq!(cache.ordinal(1).unwrap(), 1);
        assert_eq!(cache.ordinal(2).unwrap(), 2);
        assert_eq!(cache.ordinal(3).unwrap(), 0);
    }
}
