//! Index configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Index-wide layout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Architecture {
    /// Number of terms between entries of a lexicon's sparse index.
    pub index_interval: u32,

    /// Minimum document frequency at which a term records skip data.
    pub skip_interval: u32,
}

impl Default for Architecture {
    fn default() -> Self {
        Self {
            index_interval: 128,
            skip_interval: 16,
        }
    }
}

impl Architecture {
    /// Creates an architecture with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the lexicon index interval.
    #[must_use]
    pub const fn index_interval(mut self, value: u32) -> Self {
        self.index_interval = value;
        self
    }

    /// Sets the skip interval.
    #[must_use]
    pub const fn skip_interval(mut self, value: u32) -> Self {
        self.skip_interval = value;
        self
    }
}

/// Configuration for an external sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortConfig {
    /// Bytes of items the write cache may hold before it is spilled.
    pub mem_thresh: usize,

    /// Lower bound for the per-run memory share computed at flip time.
    pub min_run_mem_thresh: usize,

    /// Directory for spilled runs. `None` keeps runs in memory.
    pub spill_dir: Option<PathBuf>,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            mem_thresh: 4 * 1024 * 1024, // 4 MiB
            min_run_mem_thresh: 65_536,
            spill_dir: None,
        }
    }
}

impl SortConfig {
    /// Creates a sort configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the write-cache memory threshold.
    #[must_use]
    pub const fn mem_thresh(mut self, bytes: usize) -> Self {
        self.mem_thresh = bytes;
        self
    }

    /// Sets the per-run memory floor.
    #[must_use]
    pub const fn min_run_mem_thresh(mut self, bytes: usize) -> Self {
        self.min_run_mem_thresh = bytes;
        self
    }

    /// Spills runs to files in `dir` instead of memory.
    #[must_use]
    pub fn spill_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spill_dir = Some(dir.into());
        self
    }
}

/// Configuration for a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    /// How long `obtain` keeps retrying. Zero means a single attempt.
    pub timeout: Duration,

    /// Delay between attempts. Must be non-zero.
    pub interval: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            interval: Duration::from_millis(100),
        }
    }
}

impl LockConfig {
    /// Creates a lock configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry budget.
    #[must_use]
    pub const fn timeout(mut self, value: Duration) -> Self {
        self.timeout = value;
        self
    }

    /// Sets the polling interval.
    #[must_use]
    pub const fn interval(mut self, value: Duration) -> Self {
        self.interval = value;
        self
    }
}
