//! Process identity queries used by lock files.

/// Answers "who am I" and "is that process still running" for the lock
/// manager.
pub trait ProcessTable: Send + Sync + std::fmt::Debug {
    /// Id of the current process.
    fn current_pid(&self) -> u32;

    /// Returns true if a process with `pid` is running on this host.
    fn is_alive(&self, pid: u32) -> bool;
}

/// The operating system's process table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcesses;

impl ProcessTable for SystemProcesses {
    fn current_pid(&self) -> u32 {
        std::process::id()
    }

    #[cfg(unix)]
    #[allow(unsafe_code)]
    fn is_alive(&self, pid: u32) -> bool {
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        if pid <= 0 {
            return false;
        }
        // SAFETY: signal 0 performs only the existence and permission check.
        let rc = unsafe { libc::kill(pid, 0) };
        rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    // Liveness can't be probed here, so every pid counts as running and
    // stale locks are never reclaimed.
    #[cfg(not(unix))]
    fn is_alive(&self, _pid: u32) -> bool {
        true
    }
}
