//! Shared types for the unfollow watcher
//!
//! Follower snapshots and the bookkeeping records derived from them,
//! used by both the remote client and the watcher.

pub mod models;
pub mod util;

// Re-exports
pub use models::{FollowerSnapshot, PendingFollow, SnapshotCounter, UnfollowNotification};
pub use serde::{Deserialize, Serialize};
