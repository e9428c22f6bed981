//! Streams over folder files, lock files and process identity.

mod lock;
mod process;
mod stream;

pub use lock::{LockFileLock, LockRecord, LOCK_DIR};
pub use process::{ProcessTable, SystemProcesses};
pub use stream::{InStream, OutStream, IO_BUF_SIZE};
