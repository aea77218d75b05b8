//! Follow-back and unfollow notification records

use serde::{Deserialize, Serialize};

/// Marker for a follow-back request already sent to a user
///
/// No expiry: while it exists the follow request is never repeated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFollow {
    pub subject_id: i64,
    /// Unix seconds
    pub marked_at: i64,
}

impl PendingFollow {
    pub fn new(subject_id: i64) -> Self {
        Self {
            subject_id,
            marked_at: crate::util::now_secs(),
        }
    }
}

/// Dedup record for an unfollow that was already reported
///
/// One per (abandoned user, unfollower) pair, written only after the
/// notification was delivered. A later re-follow + unfollow by the same
/// account is not reported again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnfollowNotification {
    pub abandoned_user_id: i64,
    pub unfollower_id: i64,
}

impl UnfollowNotification {
    pub fn new(abandoned_user_id: i64, unfollower_id: i64) -> Self {
        Self {
            abandoned_user_id,
            unfollower_id,
        }
    }
}
