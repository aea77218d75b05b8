//! Follower Snapshot Models

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Point-in-time capture of a user's follower list
///
/// Produced by the remote client on every successful fetch and never
/// mutated afterwards. `followers` keeps the order the remote returned and
/// holds no duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowerSnapshot {
    pub subject_id: i64,
    /// Unix millis
    pub captured_at: i64,
    pub followers: Vec<i64>,
}

impl FollowerSnapshot {
    /// Capture a snapshot now
    pub fn new(subject_id: i64, followers: Vec<i64>) -> Self {
        Self::captured_at(subject_id, crate::util::now_millis(), followers)
    }

    /// Capture a snapshot with an explicit timestamp
    pub fn captured_at(subject_id: i64, captured_at: i64, followers: Vec<i64>) -> Self {
        Self {
            subject_id,
            captured_at,
            followers,
        }
    }

    pub fn follower_count(&self) -> usize {
        self.followers.len()
    }

    pub fn follower_set(&self) -> HashSet<i64> {
        self.followers.iter().copied().collect()
    }

    /// Derive the audit counter for this snapshot
    pub fn counter(&self) -> SnapshotCounter {
        SnapshotCounter {
            subject_id: self.subject_id,
            captured_at: self.captured_at,
            follower_count: self.followers.len() as i64,
        }
    }
}

/// Append-only follower count log entry (kept forever)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCounter {
    pub subject_id: i64,
    pub captured_at: i64,
    pub follower_count: i64,
}
