//! Follower crawler
//!
//! 每轮依次处理被监控用户：
//!
//! 1. 读取上一次快照
//! 2. 拉取当前粉丝列表
//! 3. 对比，得到取关者
//! 4. 逐个发送通知 (去重)
//! 5. 保存新快照
//!
//! 拉取被拒 (401) 时改走 follow-back 流程。连续失败达到上限时中止整轮。

mod diff;
#[cfg(test)]
mod tests;

pub use diff::{DiffOutcome, diff_followers};

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};
use unfollow_client::{ClientError, GraphApi};

use crate::core::CrawlConfig;
use crate::db::{SnapshotStore, StoreError};

/// Crawl error types
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Too many departures at once; one of the snapshots is broken
    #[error("too many unfollows for user {user_id}: {departures} > {limit}")]
    SafetyLimitExceeded {
        user_id: i64,
        departures: usize,
        limit: usize,
    },

    #[error("too many errors ({errors}), run aborted")]
    RunAborted { errors: u32 },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CrawlError {
    /// Errors that stop the whole run instead of one user
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CrawlError::SafetyLimitExceeded { .. } | CrawlError::RunAborted { .. }
        )
    }
}

pub type CrawlResult<T> = Result<T, CrawlError>;

/// How one user's cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOutcome {
    /// Diffed (when a prior snapshot existed) and processed
    Completed {
        unfollows: usize,
        notified: usize,
        failures: u32,
    },
    /// Follower list is private; follow-back workflow ran instead
    FollowRequested,
    /// Nothing to do for this user this cycle
    Skipped,
    /// Current follower list could not be fetched
    FetchFailed,
}

/// Totals for one run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub users: usize,
    pub unfollows: usize,
    pub notified: usize,
    pub follow_requests: usize,
    pub skipped: usize,
    pub failures: u32,
}

/// Diff orchestrator
pub struct Crawler {
    api: Arc<dyn GraphApi>,
    store: SnapshotStore,
    config: CrawlConfig,
    tracked_users: Vec<i64>,
    /// user id -> screen name, cleared every run
    names: HashMap<i64, String>,
}

impl Crawler {
    pub fn new(api: Arc<dyn GraphApi>, store: SnapshotStore, config: &CrawlConfig) -> Self {
        Self {
            api,
            store,
            config: config.clone(),
            tracked_users: Vec::new(),
            names: HashMap::new(),
        }
    }

    pub fn tracked_users(&self) -> &[i64] {
        &self.tracked_users
    }

    pub fn set_tracked_users(&mut self, users: Vec<i64>) {
        self.tracked_users = users;
    }

    /// Everyone following the hub account is a tracked user
    pub async fn find_tracked_users(&mut self, hub_uid: i64) -> CrawlResult<usize> {
        self.api.verify_credentials().await?;
        let hub = self.api.fetch_followers(hub_uid, "").await?;

        if let Err(e) = self.store.insert_snapshot(&hub).await {
            warn!(hub_uid, error = %e, "Failed to save hub snapshot");
        }

        info!(hub_uid, tracked = hub.follower_count(), "Tracked users refreshed");
        self.tracked_users = hub.followers;
        Ok(self.tracked_users.len())
    }

    /// Process every tracked user once
    pub async fn run(&mut self) -> CrawlResult<RunSummary> {
        self.names.clear();
        let users = self.tracked_users.clone();
        let mut summary = RunSummary::default();
        let mut errors: u32 = 0;

        for user_id in users {
            summary.users += 1;

            match self.process_user(user_id).await {
                Ok(UserOutcome::Completed {
                    unfollows,
                    notified,
                    failures,
                }) => {
                    summary.unfollows += unfollows;
                    summary.notified += notified;
                    summary.failures += failures;
                    if failures == 0 {
                        errors = 0;
                    } else {
                        errors += failures;
                    }
                }
                Ok(UserOutcome::FollowRequested) => summary.follow_requests += 1,
                Ok(UserOutcome::Skipped) => summary.skipped += 1,
                Ok(UserOutcome::FetchFailed) => {
                    summary.failures += 1;
                    errors += 1;
                }
                Err(e) if e.is_fatal() => {
                    error!(user_id, error = %e, "Run stopped");
                    return Err(e);
                }
                Err(e) => {
                    warn!(user_id, error = %e, "User cycle failed");
                    summary.failures += 1;
                    errors += 1;
                }
            }

            if errors >= self.config.max_errors {
                error!(errors, "Too many errors, aborting run");
                return Err(CrawlError::RunAborted { errors });
            }
        }

        info!(
            users = summary.users,
            unfollows = summary.unfollows,
            notified = summary.notified,
            follow_requests = summary.follow_requests,
            failures = summary.failures,
            dry_run = self.config.dry_run,
            "Run finished"
        );
        Ok(summary)
    }

    /// One user's cycle
    pub async fn process_user(&mut self, user_id: i64) -> CrawlResult<UserOutcome> {
        if self.config.is_ignored(user_id) {
            debug!(user_id, "Ignored user, skipping");
            return Ok(UserOutcome::Skipped);
        }

        let prior = match self.store.get_latest_snapshot(user_id).await {
            Ok(prior) => prior,
            Err(e) => {
                warn!(user_id, error = %e, "Failed to read previous snapshot, treating as first run");
                None
            }
        };

        let current = match self.api.fetch_followers(user_id, "").await {
            Ok(snapshot) => snapshot,
            Err(ClientError::NotAuthorized) => {
                info!(user_id, "Follower list not visible, requesting follow");
                if let Err(e) = self.follow_user(user_id).await {
                    warn!(user_id, error = %e, "Follow workflow failed");
                }
                return Ok(UserOutcome::FollowRequested);
            }
            Err(ClientError::EmptyFollowerList { .. }) => {
                warn!(user_id, "No followers returned, skipping");
                return Ok(UserOutcome::Skipped);
            }
            Err(e) => {
                warn!(user_id, error = %e, "Failed to fetch followers");
                return Ok(UserOutcome::FetchFailed);
            }
        };

        let mut unfollows = 0;
        let mut notified = 0;
        let mut failures = 0;

        match prior {
            Some(prior) => {
                let outcome = diff_followers(&prior, &current, &self.config)?;

                if !outcome.corrupt.is_empty() {
                    error!(user_id, ids = ?outcome.corrupt, "Bogus follower ids in stored snapshot");
                    if let Err(e) = self.store.reconnect().await {
                        error!(user_id, error = %e, "Store reconnect failed");
                        failures += 1;
                    }
                }
                if !outcome.ignored.is_empty() {
                    debug!(user_id, ids = ?outcome.ignored, "Ignored unfollowers");
                }

                unfollows = outcome.candidates.len();
                for unfollower in outcome.candidates {
                    match self.process_unfollow(user_id, unfollower).await {
                        Ok(true) => notified += 1,
                        Ok(false) => {}
                        Err(e) => {
                            warn!(user_id, unfollower, error = %e, "Failed to process unfollow");
                            failures += 1;
                        }
                    }
                }
            }
            None => debug!(user_id, "No previous snapshot"),
        }

        // Keep the old snapshot so unsent notifications come back next cycle
        if failures > 0 {
            warn!(user_id, failures, "Snapshot not saved");
            return Ok(UserOutcome::Completed {
                unfollows,
                notified,
                failures,
            });
        }

        if let Err(e) = self.store.insert_snapshot(&current).await {
            warn!(user_id, error = %e, "Failed to save snapshot");
            failures += 1;
        }

        Ok(UserOutcome::Completed {
            unfollows,
            notified,
            failures,
        })
    }

    /// Notify `abandoned` that `unfollower` left
    ///
    /// Returns whether a message went out (or would have, in dry-run).
    pub async fn process_unfollow(&mut self, abandoned: i64, unfollower: i64) -> CrawlResult<bool> {
        if !self.config.notify_users {
            info!(abandoned, unfollower, "Unfollow detected, notifications disabled");
            return Ok(false);
        }

        if self.store.was_unfollow_notified(abandoned, unfollower).await? {
            debug!(abandoned, unfollower, "Already notified");
            return Ok(false);
        }

        let (abandoned_name, unfollower_name) = match self.display_names(abandoned, unfollower).await {
            Ok(names) => names,
            // 账号已删除或被封，重试也没用，不阻塞快照保存
            Err(CrawlError::Client(e)) if e.is_permanent() => {
                warn!(abandoned, unfollower, error = %e, "Account unavailable, skipping unfollow");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        let text = self.config.render_message(&unfollower_name);

        if self.config.dry_run {
            info!(to = %abandoned_name, unfollower = %unfollower_name, text = %text, "Dry run, message not sent");
            return Ok(true);
        }

        self.api.send_direct_message(&abandoned_name, &text).await?;
        info!(to = %abandoned_name, unfollower = %unfollower_name, "Unfollow notification sent");
        self.store.mark_unfollow_notified(abandoned, unfollower).await?;
        Ok(true)
    }

    /// Follow-back workflow for users whose follower list is private
    ///
    /// Returns whether a follow request was issued.
    pub async fn follow_user(&mut self, user_id: i64) -> CrawlResult<bool> {
        if self.store.is_follow_pending(user_id).await? {
            debug!(user_id, "Follow already requested");
            return Ok(false);
        }

        if self.config.dry_run {
            info!(user_id, "Dry run, follow request not sent");
            return Ok(false);
        }

        self.api.request_follow(user_id).await?;
        self.store.mark_follow_pending(user_id).await?;
        info!(user_id, "Follow requested");
        Ok(true)
    }

    async fn display_names(&mut self, abandoned: i64, unfollower: i64) -> CrawlResult<(String, String)> {
        Ok((
            self.display_name(abandoned).await?,
            self.display_name(unfollower).await?,
        ))
    }

    async fn display_name(&mut self, user_id: i64) -> CrawlResult<String> {
        if let Some(name) = self.names.get(&user_id) {
            return Ok(name.clone());
        }
        let name = self.api.get_display_name(user_id).await?;
        self.names.insert(user_id, name.clone());
        Ok(name)
    }
}
