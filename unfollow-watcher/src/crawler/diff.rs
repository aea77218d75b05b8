//! Snapshot diffing

use shared::FollowerSnapshot;

use super::{CrawlError, CrawlResult};
use crate::core::CrawlConfig;

/// Departures between two snapshots, split by what happens to them
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiffOutcome {
    /// Unfollows to act on, in prior-snapshot order
    pub candidates: Vec<i64>,
    /// Departing IDs below the plausibility floor
    pub corrupt: Vec<i64>,
    /// Departing IDs on the ignore list
    pub ignored: Vec<i64>,
}

/// Followers present in `prior` and absent from `current`
///
/// More raw departures than `max_unfollows` means one of the two snapshots
/// is broken, so nothing is returned.
pub fn diff_followers(
    prior: &FollowerSnapshot,
    current: &FollowerSnapshot,
    config: &CrawlConfig,
) -> CrawlResult<DiffOutcome> {
    let still_following = current.follower_set();
    let departed: Vec<i64> = prior
        .followers
        .iter()
        .copied()
        .filter(|id| !still_following.contains(id))
        .collect();

    if departed.len() > config.max_unfollows {
        return Err(CrawlError::SafetyLimitExceeded {
            user_id: prior.subject_id,
            departures: departed.len(),
            limit: config.max_unfollows,
        });
    }

    let mut outcome = DiffOutcome::default();
    for id in departed {
        if id < config.min_plausible_id {
            outcome.corrupt.push(id);
        } else if config.is_ignored(id) {
            outcome.ignored.push(id);
        } else {
            outcome.candidates.push(id);
        }
    }
    Ok(outcome)
}
