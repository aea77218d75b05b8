//! Unfollow Client - signed client for the remote social-graph API
//!
//! Fetches paginated follower lists, resolves screen names and performs the
//! two mutations the watcher needs (direct messages and follow requests).
//! Every call is OAuth 1.0a signed, bounded by a timeout and throttled by the
//! remote rate-limit headers.

pub mod api;
pub mod config;
pub mod error;
pub mod oauth;
pub mod rate_limit;
pub mod twitter;
pub mod types;

pub use api::GraphApi;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use rate_limit::{Backoff, RateLimitInfo};
pub use twitter::TwitterClient;

// Re-export shared types for convenience
pub use shared::FollowerSnapshot;
