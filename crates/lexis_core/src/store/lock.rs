//! Cross-process lock files.
//!
//! A lock named `write` is held while `locks/write.lock` exists. Acquiring
//! it is a two-step protocol:
//!
//! 1. write `{pid, host, name}` as JSON to a per-owner temp file,
//!    `locks/write.lock.<host>.<pid>`;
//! 2. hard-link the temp file to `locks/write.lock`.
//!
//! The link fails if the destination exists, so at most one requester can
//! succeed, and the lock file is never observed half-written. The temp file
//! is deleted afterwards whether or not the link succeeded. A crash between
//! the two steps leaves an orphan temp file; orphans are harmless to the
//! protocol and are left for administrative cleanup through
//! [`LockFileLock::maybe_delete_file`].

use crate::config::LockConfig;
use crate::error::{CoreError, CoreResult};
use crate::store::process::{ProcessTable, SystemProcesses};
use lexis_storage::Folder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// Directory holding every lock file of an index folder.
pub const LOCK_DIR: &str = "locks";

/// The JSON record stored in a lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Process id of the owner.
    pub pid: u32,
    /// Host the owner runs on.
    pub host: String,
    /// Lock name.
    pub name: String,
}

/// A named, exclusive lock backed by a file in a shared [`Folder`].
#[derive(Debug)]
pub struct LockFileLock {
    folder: Arc<dyn Folder>,
    processes: Arc<dyn ProcessTable>,
    name: String,
    host: String,
    config: LockConfig,
    lock_path: String,
    link_path: String,
}

fn validate_name(name: &str) -> CoreResult<()> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_');
    if name.is_empty() || !name.chars().all(allowed) {
        return Err(CoreError::invalid_argument(format!(
            "lock name contains disallowed characters: '{name}'"
        )));
    }
    Ok(())
}

impl LockFileLock {
    /// Creates a lock using the operating system's process table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the name contains
    /// characters other than ASCII alphanumerics, `.`, `-` and `_`, if the
    /// host contains a path separator, or if the polling interval is zero.
    pub fn new(
        folder: Arc<dyn Folder>,
        name: &str,
        host: &str,
        config: LockConfig,
    ) -> CoreResult<Self> {
        Self::with_processes(folder, name, host, config, Arc::new(SystemProcesses))
    }

    /// Creates a lock with an explicit process table.
    ///
    /// # Errors
    ///
    /// Same as [`LockFileLock::new`].
    pub fn with_processes(
        folder: Arc<dyn Folder>,
        name: &str,
        host: &str,
        config: LockConfig,
        processes: Arc<dyn ProcessTable>,
    ) -> CoreResult<Self> {
        if config.interval.is_zero() {
            return Err(CoreError::invalid_argument(
                "invalid value for 'interval': 0",
            ));
        }
        validate_name(name)?;
        if host.contains(['/', '\\']) {
            return Err(CoreError::invalid_argument(format!(
                "host contains a path separator: '{host}'"
            )));
        }

        let lock_path = format!("{LOCK_DIR}/{name}.lock");
        let link_path = format!("{lock_path}.{host}.{}", processes.current_pid());
        Ok(Self {
            folder,
            processes,
            name: name.to_string(),
            host: host.to_string(),
            config,
            lock_path,
            link_path,
        })
    }

    /// Lock name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host identifier recorded in lock files.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Path of the lock file, `locks/<name>.lock`.
    #[must_use]
    pub fn lock_path(&self) -> &str {
        &self.lock_path
    }

    /// Path of this owner's temp file, `locks/<name>.lock.<host>.<pid>`.
    #[must_use]
    pub fn link_path(&self) -> &str {
        &self.link_path
    }

    /// Returns true if anyone holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.folder.exists(&self.lock_path)
    }

    /// Makes a single attempt to acquire the lock.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LockAcquisition`] if the lock is held or if any
    /// step of the acquisition fails.
    pub fn request(&self) -> CoreResult<()> {
        let fail = |message: String| CoreError::lock_acquisition(&self.lock_path, message);

        if self.folder.exists(&self.lock_path) {
            return Err(fail(format!("'{}' exists", self.lock_path)));
        }

        if !self.folder.exists(LOCK_DIR) {
            if let Err(e) = self.folder.mkdir(LOCK_DIR) {
                // Another process may have created it first.
                if !self.folder.is_directory(LOCK_DIR) {
                    return Err(fail(format!("can't create '{LOCK_DIR}' directory: {e}")));
                }
            }
        }

        let record = LockRecord {
            pid: self.processes.current_pid(),
            host: self.host.clone(),
            name: self.name.clone(),
        };
        let json = serde_json::to_vec(&record).map_err(|e| fail(e.to_string()))?;

        let linked = match self.folder.spew_file(&self.link_path, &json) {
            Ok(()) => self.folder.hard_link(&self.link_path, &self.lock_path),
            Err(e) => Err(e),
        };
        match self.folder.delete(&self.link_path) {
            Ok(_) => {}
            Err(e) => warn!(
                path = %self.link_path,
                error = %e,
                "failed to delete temporary lock file"
            ),
        }

        match linked {
            Ok(()) => {
                debug!(lock = %self.lock_path, pid = record.pid, "lock obtained");
                Ok(())
            }
            Err(e) => Err(fail(format!("failed to obtain lock: {e}"))),
        }
    }

    /// Acquires the lock, retrying every `interval` until `timeout` is used
    /// up. A zero timeout makes exactly one attempt.
    ///
    /// # Errors
    ///
    /// Returns the last [`CoreError::LockAcquisition`] error if the budget
    /// runs out.
    pub fn obtain(&self) -> CoreResult<()> {
        let interval = self.config.interval;
        let mut time_left = self.config.timeout;
        loop {
            match self.request() {
                Ok(()) => return Ok(()),
                Err(e) if e.is_lock_acquisition() => match time_left.checked_sub(interval) {
                    Some(left) if !left.is_zero() => {
                        time_left = left;
                        thread::sleep(interval);
                    }
                    _ => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// Releases the lock if this process holds it. A missing lock file is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StaleLockCleanup`] if the lock file is ours but
    /// cannot be deleted.
    pub fn release(&self) -> CoreResult<()> {
        if self.folder.exists(&self.lock_path)
            && self.maybe_delete_file(&self.lock_path, true, false)?
        {
            debug!(lock = %self.lock_path, "lock released");
        }
        Ok(())
    }

    /// Deletes the lock file if it was left behind by a dead process on
    /// this host. Returns true if a file was deleted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StaleLockCleanup`] if the file qualifies for
    /// deletion but cannot be removed.
    pub fn clear_stale(&self) -> CoreResult<bool> {
        self.maybe_delete_file(&self.lock_path, false, true)
    }

    /// Deletes `path` if it is a lock record for this lock name and host,
    /// and its pid is either this process (`delete_mine`) or not running
    /// (`delete_other`). Returns true if the file was deleted.
    ///
    /// Paths outside `locks/<name>` and records from other hosts are never
    /// touched. Unreadable records are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StaleLockCleanup`] if a qualifying file cannot
    /// be deleted.
    pub fn maybe_delete_file(
        &self,
        path: &str,
        delete_mine: bool,
        delete_other: bool,
    ) -> CoreResult<bool> {
        let Some(rest) = path.strip_prefix(LOCK_DIR).and_then(|p| p.strip_prefix('/')) else {
            return Ok(false);
        };
        if !rest.starts_with(self.name.as_str()) || !self.folder.exists(path) {
            return Ok(false);
        }

        let record: LockRecord = match self
            .folder
            .slurp_file(path)
            .map_err(CoreError::from)
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(CoreError::from))
        {
            Ok(record) => record,
            Err(e) => {
                warn!(path, error = %e, "unreadable lock file left in place");
                return Ok(false);
            }
        };

        if record.host != self.host || record.name != self.name {
            return Ok(false);
        }
        let mine = delete_mine && record.pid == self.processes.current_pid();
        let dead = delete_other && !self.processes.is_alive(record.pid);
        if !(mine || dead) {
            return Ok(false);
        }

        match self.folder.delete(path) {
            Ok(deleted) => {
                if deleted && dead && !mine {
                    debug!(path, pid = record.pid, "cleared stale lock");
                }
                Ok(deleted)
            }
            Err(e) => Err(CoreError::stale_lock_cleanup(path, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexis_storage::{RamFolder, StorageBackend, StorageError, StorageResult};
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::time::{Duration, Instant};

    #[derive(Debug)]
    struct Procs {
        pid: u32,
        alive: Arc<Mutex<HashSet<u32>>>,
    }

    impl ProcessTable for Procs {
        fn current_pid(&self) -> u32 {
            self.pid
        }

        fn is_alive(&self, pid: u32) -> bool {
            self.alive.lock().contains(&pid)
        }
    }

    struct World {
        folder: Arc<RamFolder>,
        alive: Arc<Mutex<HashSet<u32>>>,
    }

    impl World {
        fn new() -> Self {
            Self {
                folder: Arc::new(RamFolder::new()),
                alive: Arc::new(Mutex::new(HashSet::new())),
            }
        }

        fn lock(&self, name: &str, host: &str, pid: u32) -> LockFileLock {
            self.alive.lock().insert(pid);
            let procs = Procs {
                pid,
                alive: Arc::clone(&self.alive),
            };
            LockFileLock::with_processes(
                self.folder.clone(),
                name,
                host,
                LockConfig::default(),
                Arc::new(procs),
            )
            .unwrap()
        }

        fn kill(&self, pid: u32) {
            self.alive.lock().remove(&pid);
        }
    }

    #[test]
    fn paths_are_derived_from_name_host_and_pid() {
        let world = World::new();
        let lock = world.lock("build", "h1", 100);
        assert_eq!(lock.lock_path(), "locks/build.lock");
        assert_eq!(lock.link_path(), "locks/build.lock.h1.100");
        assert_eq!(lock.name(), "build");
        assert_eq!(lock.host(), "h1");
    }

    #[test]
    fn invalid_names_and_intervals_are_rejected() {
        let folder: Arc<dyn Folder> = Arc::new(RamFolder::new());
        for bad in ["", "a/b", "wr ite", "lock*"] {
            let result = LockFileLock::new(folder.clone(), bad, "h1", LockConfig::default());
            assert!(
                matches!(result, Err(CoreError::InvalidArgument { .. })),
                "name {bad:?}"
            );
        }
        assert!(LockFileLock::new(folder.clone(), "a.b-c_9", "h1", LockConfig::default()).is_ok());

        let zero = LockConfig::default().interval(Duration::ZERO);
        assert!(matches!(
            LockFileLock::new(folder, "write", "h1", zero),
            Err(CoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn mutual_exclusion_between_processes() {
        let world = World::new();
        let first = world.lock("build", "h1", 100);
        let second = world.lock("build", "h1", 200);

        first.request().unwrap();
        assert!(first.is_locked());

        let err = second.request().unwrap_err();
        assert!(err.is_lock_acquisition());

        first.release().unwrap();
        assert!(!first.is_locked());
        second.request().unwrap();
    }

    #[test]
    fn request_writes_record_and_removes_temp_file() {
        let world = World::new();
        let lock = world.lock("write", "h1", 100);
        lock.request().unwrap();

        assert!(!world.folder.exists(lock.link_path()));
        let record: LockRecord =
            serde_json::from_slice(&world.folder.slurp_file(lock.lock_path()).unwrap()).unwrap();
        assert_eq!(
            record,
            LockRecord {
                pid: 100,
                host: "h1".into(),
                name: "write".into(),
            }
        );

        // A refused attempt leaves no temp file behind.
        let other = world.lock("write", "h1", 200);
        assert!(other.request().is_err());
        assert_eq!(world.folder.list_files(), vec!["locks/write.lock".to_string()]);
    }

    /// A folder that refuses to delete temporary lock files.
    #[derive(Debug, Default)]
    struct StickyTempFolder {
        inner: RamFolder,
    }

    impl Folder for StickyTempFolder {
        fn open_in(&self, path: &str) -> StorageResult<Box<dyn StorageBackend>> {
            self.inner.open_in(path)
        }

        fn open_out(&self, path: &str) -> StorageResult<Box<dyn StorageBackend>> {
            self.inner.open_out(path)
        }

        fn exists(&self, path: &str) -> bool {
            self.inner.exists(path)
        }

        fn is_directory(&self, path: &str) -> bool {
            self.inner.is_directory(path)
        }

        fn mkdir(&self, path: &str) -> StorageResult<()> {
            self.inner.mkdir(path)
        }

        fn delete(&self, path: &str) -> StorageResult<bool> {
            if path.contains(".lock.") {
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only",
                )));
            }
            self.inner.delete(path)
        }

        fn hard_link(&self, from: &str, to: &str) -> StorageResult<()> {
            self.inner.hard_link(from, to)
        }
    }

    #[test]
    fn undeletable_temp_file_does_not_fail_request() {
        let folder = Arc::new(StickyTempFolder::default());
        let procs = Procs {
            pid: 100,
            alive: Arc::new(Mutex::new(HashSet::from([100]))),
        };
        let lock = LockFileLock::with_processes(
            folder.clone(),
            "write",
            "h1",
            LockConfig::default(),
            Arc::new(procs),
        )
        .unwrap();

        lock.request().unwrap();
        assert!(lock.is_locked());
        assert!(folder.exists(lock.lock_path()));
        assert!(folder.exists(lock.link_path()));
    }

    #[test]
    fn release_leaves_other_owners_alone() {
        let world = World::new();
        let owner = world.lock("write", "h1", 100);
        let bystander = world.lock("write", "h1", 200);

        owner.request().unwrap();
        bystander.release().unwrap();
        assert!(owner.is_locked());

        // Releasing an absent lock is fine.
        owner.release().unwrap();
        owner.release().unwrap();
    }

    #[test]
    fn clear_stale_requires_dead_pid_on_same_host() {
        let world = World::new();
        let crashed = world.lock("build", "h1", 100);
        let survivor = world.lock("build", "h1", 200);
        let remote = world.lock("build", "h2", 300);

        crashed.request().unwrap();
        assert!(!survivor.clear_stale().unwrap());
        assert!(survivor.is_locked());

        world.kill(100);
        assert!(!remote.clear_stale().unwrap());
        assert!(survivor.is_locked());

        assert!(survivor.clear_stale().unwrap());
        assert!(!survivor.is_locked());
        survivor.request().unwrap();
    }

    #[test]
    fn maybe_delete_file_ignores_foreign_paths() {
        let world = World::new();
        let lock = world.lock("build", "h1", 100);
        world.folder.mkdir("locks").unwrap();
        world.folder.spew_file("locks/other.lock", b"{}").unwrap();
        world.folder.spew_file("index.json", b"{}").unwrap();

        assert!(!lock.maybe_delete_file("locks/other.lock", true, true).unwrap());
        assert!(!lock.maybe_delete_file("index.json", true, true).unwrap());
        assert!(world.folder.exists("locks/other.lock"));
    }

    #[test]
    fn maybe_delete_file_clears_orphan_temp_files() {
        let world = World::new();
        let lock = world.lock("build", "h1", 100);
        world.folder.mkdir("locks").unwrap();
        let orphan = LockRecord {
            pid: 42,
            host: "h1".into(),
            name: "build".into(),
        };
        let path = "locks/build.lock.h1.42";
        world
            .folder
            .spew_file(path, &serde_json::to_vec(&orphan).unwrap())
            .unwrap();

        assert!(lock.maybe_delete_file(path, false, true).unwrap());
        assert!(!world.folder.exists(path));
    }

    #[test]
    fn garbage_lock_file_is_left_in_place() {
        let world = World::new();
        let lock = world.lock("build", "h1", 100);
        world.folder.mkdir("locks").unwrap();
        world.folder.spew_file("locks/build.lock", b"not json").unwrap();

        assert!(!lock.clear_stale().unwrap());
        assert!(lock.is_locked());
    }

    #[test]
    fn obtain_with_zero_timeout_tries_once() {
        let world = World::new();
        let holder = world.lock("write", "h1", 100);
        holder.request().unwrap();

        let waiter = world.lock("write", "h1", 200);
        let started = Instant::now();
        assert!(waiter.obtain().unwrap_err().is_lock_acquisition());
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn obtain_succeeds_once_holder_releases() {
        let world = World::new();
        let holder = world.lock("write", "h1", 100);
        holder.request().unwrap();

        let procs = Procs {
            pid: 200,
            alive: Arc::clone(&world.alive),
        };
        let config = LockConfig::default()
            .timeout(Duration::from_secs(5))
            .interval(Duration::from_millis(5));
        let waiter = LockFileLock::with_processes(
            world.folder.clone(),
            "write",
            "h1",
            config,
            Arc::new(procs),
        )
        .unwrap();

        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            holder.release().unwrap();
        });
        waiter.obtain().unwrap();
        releaser.join().unwrap();
        assert!(waiter.is_locked());
    }

    #[test]
    fn obtain_gives_up_after_timeout() {
        let world = World::new();
        let holder = world.lock("write", "h1", 100);
        holder.request().unwrap();

        let procs = Procs {
            pid: 200,
            alive: Arc::clone(&world.alive),
        };
        let config = LockConfig::default()
            .timeout(Duration::from_millis(30))
            .interval(Duration::from_millis(10));
        let waiter = LockFileLock::with_processes(
            world.folder.clone(),
            "write",
            "h1",
            config,
            Arc::new(procs),
        )
        .unwrap();
        assert!(waiter.obtain().unwrap_err().is_lock_acquisition());
    }
}
