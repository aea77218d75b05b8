// unfollow-client/src/api.rs
// 远程社交图 API trait

use async_trait::async_trait;
use shared::FollowerSnapshot;

use crate::ClientResult;

/// Operations the watcher needs from the remote social graph
///
/// Implementations are always "live": dry-run gating is the caller's job.
#[async_trait]
pub trait GraphApi: Send + Sync {
    /// Check that the configured credentials are accepted
    async fn verify_credentials(&self) -> ClientResult<()>;

    /// Fetch the complete follower list of a user
    ///
    /// A nonzero `subject_id` wins over `screen_name`.
    async fn fetch_followers(
        &self,
        subject_id: i64,
        screen_name: &str,
    ) -> ClientResult<FollowerSnapshot>;

    /// Resolve a user ID to its screen name
    async fn get_display_name(&self, user_id: i64) -> ClientResult<String>;

    async fn send_direct_message(&self, to_screen_name: &str, text: &str) -> ClientResult<()>;

    async fn request_follow(&self, user_id: i64) -> ClientResult<()>;
}
