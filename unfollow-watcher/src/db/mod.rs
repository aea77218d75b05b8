//! Database Module
//!
//! Snapshot and bookkeeping persistence. `DocumentStore` is the raw backend
//! capability; `SnapshotStore` layers the retry and dry-run policy on top
//! so callers never deal with either.

#[cfg(test)]
pub(crate) mod memory;
pub mod surreal;

pub use surreal::SurrealStore;

use async_trait::async_trait;
use shared::{FollowerSnapshot, PendingFollow, SnapshotCounter, UnfollowNotification};
use thiserror::Error;

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl StoreError {
    /// Faults worth one reconnect + retry
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Connection(_) | StoreError::Database(_))
    }
}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Raw document backend, one table per record kind
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Most recently captured snapshot of a subject
    async fn latest_snapshot(&self, subject_id: i64) -> StoreResult<Option<FollowerSnapshot>>;
    async fn insert_snapshot(&self, snapshot: &FollowerSnapshot) -> StoreResult<()>;
    async fn insert_counter(&self, counter: &SnapshotCounter) -> StoreResult<()>;

    async fn has_pending_follow(&self, subject_id: i64) -> StoreResult<bool>;
    async fn insert_pending_follow(&self, marker: &PendingFollow) -> StoreResult<()>;

    async fn has_unfollow_notification(&self, record: &UnfollowNotification) -> StoreResult<bool>;
    async fn insert_unfollow_notification(&self, record: &UnfollowNotification) -> StoreResult<()>;

    /// Drop the current connection and open a fresh one
    async fn reconnect(&mut self) -> StoreResult<()>;
}

/// Run a read; on a transient fault reconnect once and run it again
macro_rules! retry_once {
    ($self:ident, $op:literal, |$backend:ident| $call:expr) => {{
        let first = {
            let $backend = &$self.backend;
            $call.await
        };
        match first {
            Err(e) if e.is_transient() => {
                tracing::warn!(op = $op, error = %e, "Store read failed, reconnecting and retrying once");
                $self.backend.reconnect().await?;
                let $backend = &$self.backend;
                $call.await
            }
            other => other,
        }
    }};
}

/// Snapshot store
///
/// - 读操作遇到连接类错误时重连一次并重试，第二次失败直接返回
/// - dry-run 模式下所有写操作为空操作，返回成功
pub struct SnapshotStore {
    backend: Box<dyn DocumentStore>,
    dry_run: bool,
}

impl SnapshotStore {
    pub fn new(backend: Box<dyn DocumentStore>, dry_run: bool) -> Self {
        Self { backend, dry_run }
    }

    /// 获取最近一次快照，不存在返回 None
    pub async fn get_latest_snapshot(
        &mut self,
        subject_id: i64,
    ) -> StoreResult<Option<FollowerSnapshot>> {
        retry_once!(self, "latest_snapshot", |backend| backend.latest_snapshot(subject_id))
    }

    /// 写入快照，然后写入计数器
    ///
    /// 计数器失败不回滚快照
    pub async fn insert_snapshot(&self, snapshot: &FollowerSnapshot) -> StoreResult<()> {
        if self.dry_run {
            tracing::debug!(subject_id = snapshot.subject_id, "Dry run, snapshot not saved");
            return Ok(());
        }
        self.backend.insert_snapshot(snapshot).await?;
        self.backend.insert_counter(&snapshot.counter()).await
    }

    pub async fn is_follow_pending(&mut self, subject_id: i64) -> StoreResult<bool> {
        retry_once!(self, "has_pending_follow", |backend| backend.has_pending_follow(subject_id))
    }

    pub async fn mark_follow_pending(&self, subject_id: i64) -> StoreResult<()> {
        if self.dry_run {
            return Ok(());
        }
        self.backend
            .insert_pending_follow(&PendingFollow::new(subject_id))
            .await
    }

    pub async fn was_unfollow_notified(
        &mut self,
        abandoned_user_id: i64,
        unfollower_id: i64,
    ) -> StoreResult<bool> {
        let record = UnfollowNotification::new(abandoned_user_id, unfollower_id);
        retry_once!(self, "has_unfollow_notification", |backend| backend
            .has_unfollow_notification(&record))
    }

    pub async fn mark_unfollow_notified(
        &self,
        abandoned_user_id: i64,
        unfollower_id: i64,
    ) -> StoreResult<()> {
        if self.dry_run {
            return Ok(());
        }
        self.backend
            .insert_unfollow_notification(&UnfollowNotification::new(abandoned_user_id, unfollower_id))
            .await
    }

    /// 整体替换底层连接
    pub async fn reconnect(&mut self) -> StoreResult<()> {
        self.backend.reconnect().await
    }
}
