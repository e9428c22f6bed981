//! Stress tests for Lexis.
//!
//! These tests verify behavior under heavy load and concurrent access.

use crate::fixtures::{lock_as, FakeProcesses};
use crate::integration::drain_sorter;
use lexis_core::{SortConfig, SortExternal};
use lexis_storage::Folder;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform (per thread for lock tests).
    pub operations: usize,
    /// Number of concurrent threads (for concurrent tests).
    pub threads: usize,
    /// Memory threshold for sort tests, in bytes.
    pub mem_thresh: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            mem_thresh: 1_024,
        }
    }
}

/// Run a lock contention stress test.
///
/// Each thread plays a separate process on one host and repeatedly
/// obtains and releases the same lock. Panics if two threads ever hold
/// the lock at once. Failed operations are timed-out `obtain` calls.
pub fn stress_lock_contention(folder: Arc<dyn Folder>, config: &StressConfig) -> StressTestResult {
    let holders = Arc::new(AtomicUsize::new(0));
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let base = FakeProcesses::new(1);
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let lock = lock_as(Arc::clone(&folder), "stress", "h1", &base.as_pid(t as u32 + 10))
                .expect("Failed to create lock");
            let holders = Arc::clone(&holders);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let operations = config.operations;
            thread::spawn(move || {
                for _ in 0..operations {
                    if lock.obtain().is_err() {
                        failed.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    let inside = holders.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(inside, 0, "two holders at once");
                    holders.fetch_sub(1, Ordering::SeqCst);
                    lock.release().expect("Failed to release lock");
                    successful.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Run an external sort over pseudo-random keys with a small threshold.
///
/// Every fetched item counts as one operation; an out-of-order item
/// counts as a failure.
pub fn stress_external_sort(config: &StressConfig, spill_dir: Option<&std::path::Path>) -> StressTestResult {
    let mut sort_config = SortConfig::new()
        .mem_thresh(config.mem_thresh)
        .min_run_mem_thresh(64);
    if let Some(dir) = spill_dir {
        sort_config = sort_config.spill_dir(dir);
    }
    let start = Instant::now();
    let mut sorter = SortExternal::new(sort_config);

    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    for _ in 0..config.operations {
        // xorshift64
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        sorter.feed(state % 1_000_000).expect("Failed to feed");
    }

    let items = drain_sorter(&mut sorter).expect("Failed to drain");
    let failed = items.windows(2).filter(|w| w[0] > w[1]).count()
        + config.operations.abs_diff(items.len());
    StressTestResult::new(items.len().saturating_sub(failed), failed, start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestFolder;

    #[test]
    fn test_lock_contention_in_memory() {
        let folder = TestFolder::memory();
        let config = StressConfig {
            operations: 50,
            threads: 4,
            ..Default::default()
        };
        let result = stress_lock_contention(folder.shared(), &config);
        assert_eq!(result.total_ops, 200);
        assert!(result.successful_ops > 0);
        assert!(folder.folder().exists("locks"));
        assert!(!folder.folder().exists("locks/stress.lock"));
    }

    #[test]
    fn test_lock_contention_on_disk() {
        let folder = TestFolder::disk();
        let config = StressConfig {
            operations: 20,
            threads: 3,
            ..Default::default()
        };
        let result = stress_lock_contention(folder.shared(), &config);
        assert!(result.successful_ops > 0);
        assert!(!folder.folder().exists("locks/stress.lock"));
    }

    #[test]
    fn test_external_sort_in_memory() {
        let config = StressConfig {
            operations: 5_000,
            mem_thresh: 256,
            ..Default::default()
        };
        let result = stress_external_sort(&config, None);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, 5_000);
    }

    #[test]
    fn test_external_sort_spills_to_disk_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let config = StressConfig {
            operations: 3_000,
            mem_thresh: 512,
            ..Default::default()
        };
        let result = stress_external_sort(&config, Some(dir.path()));
        assert_eq!(result.failed_ops, 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
