//! Utilities shared by the index components.

pub mod memory;
mod sort_external;

pub use sort_external::{Run, SortExternal, SortItem, SpilledRun};
