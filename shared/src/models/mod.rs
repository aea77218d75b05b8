//! Data models
//!
//! Shared between the remote client (which produces snapshots) and the
//! watcher (which diffs and persists them). All user IDs are `i64`.

pub mod follow;
pub mod snapshot;

// Re-exports
pub use follow::*;
pub use snapshot::*;
