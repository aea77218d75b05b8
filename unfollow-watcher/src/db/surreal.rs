//! SurrealDB 存储后端
//!
//! 每种记录一张表，字段名即持久化格式：
//!
//! | 表 | 字段 |
//! |----|------|
//! | user_followers | uid, date, followers |
//! | user_followers_counters | uid, date, followerscount |
//! | follow_pending | uid, date |
//! | previous_unfollows | uid, unfollower |

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{FollowerSnapshot, PendingFollow, SnapshotCounter, UnfollowNotification};
use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;

use super::{DocumentStore, StoreError, StoreResult};
use crate::core::StoreConfig;

const SNAPSHOT_TABLE: &str = "user_followers";
const COUNTER_TABLE: &str = "user_followers_counters";
const PENDING_TABLE: &str = "follow_pending";
const UNFOLLOW_TABLE: &str = "previous_unfollows";

/// SurrealDB 反序列化用（包含 SurrealDB record id）
#[derive(Debug, Deserialize)]
struct SnapshotRecord {
    #[allow(dead_code)]
    id: surrealdb::RecordId,
    uid: i64,
    date: i64,
    #[serde(default)]
    followers: Vec<i64>,
}

impl From<SnapshotRecord> for FollowerSnapshot {
    fn from(r: SnapshotRecord) -> Self {
        FollowerSnapshot::captured_at(r.uid, r.date, r.followers)
    }
}

/// 插入用结构（不含 SurrealDB id）
#[derive(Debug, Serialize)]
struct SnapshotInsert {
    uid: i64,
    date: i64,
    followers: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CounterInsert {
    uid: i64,
    date: i64,
    followerscount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PendingInsert {
    uid: i64,
    date: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct UnfollowInsert {
    uid: i64,
    unfollower: i64,
}

/// COUNT 结果
#[derive(Debug, Deserialize)]
struct CountResult {
    total: u64,
}

/// SurrealDB document store
pub struct SurrealStore {
    db: Surreal<Any>,
    config: StoreConfig,
}

impl SurrealStore {
    /// 连接并选择 namespace / database
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let db = Self::open(config).await?;
        Ok(Self {
            db,
            config: config.clone(),
        })
    }

    async fn open(config: &StoreConfig) -> StoreResult<Surreal<Any>> {
        let db = any::connect(config.endpoint.as_str())
            .await
            .map_err(|e| StoreError::Connection(format!("{}: {e}", config.endpoint)))?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            db.signin(Root {
                username: username.as_str(),
                password: password.as_str(),
            })
            .await
            .map_err(|e| StoreError::Connection(format!("signin failed: {e}")))?;
        }

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        // Existence checks hit these on every candidate
        db.query(
            "DEFINE INDEX IF NOT EXISTS follow_pending_uid ON follow_pending FIELDS uid; \
             DEFINE INDEX IF NOT EXISTS previous_unfollows_pair ON previous_unfollows FIELDS uid, unfollower",
        )
        .await?
        .check()?;

        tracing::info!(
            endpoint = %config.endpoint,
            namespace = %config.namespace,
            database = %config.database,
            "Document store connected"
        );
        Ok(db)
    }

    async fn count(&self, sql: &'static str, uid: i64, other: Option<i64>) -> StoreResult<u64> {
        let mut qb = self.db.query(sql).bind(("uid", uid));
        if let Some(other) = other {
            qb = qb.bind(("other", other));
        }
        let mut result = qb.await?;
        let counts: Vec<CountResult> = result.take(0)?;
        Ok(counts.first().map(|c| c.total).unwrap_or(0))
    }

    async fn create<T>(&self, table: &'static str, data: T) -> StoreResult<()>
    where
        T: Serialize + Send + 'static,
    {
        // bind 需要 'static，传 owned
        self.db
            .query(format!("CREATE {table} CONTENT $data"))
            .bind(("data", data))
            .await?
            .check()?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SurrealStore {
    async fn latest_snapshot(&self, subject_id: i64) -> StoreResult<Option<FollowerSnapshot>> {
        let mut result = self
            .db
            .query("SELECT * FROM user_followers WHERE uid = $uid ORDER BY date DESC LIMIT 1")
            .bind(("uid", subject_id))
            .await?;
        let records: Vec<SnapshotRecord> = result.take(0)?;
        Ok(records.into_iter().next().map(FollowerSnapshot::from))
    }

    async fn insert_snapshot(&self, snapshot: &FollowerSnapshot) -> StoreResult<()> {
        let data = SnapshotInsert {
            uid: snapshot.subject_id,
            date: snapshot.captured_at,
            followers: snapshot.followers.clone(),
        };
        self.create(SNAPSHOT_TABLE, data).await
    }

    async fn insert_counter(&self, counter: &SnapshotCounter) -> StoreResult<()> {
        let data = CounterInsert {
            uid: counter.subject_id,
            date: counter.captured_at,
            followerscount: counter.follower_count,
        };
        self.create(COUNTER_TABLE, data).await
    }

    async fn has_pending_follow(&self, subject_id: i64) -> StoreResult<bool> {
        let total = self
            .count(
                "SELECT count() AS total FROM follow_pending WHERE uid = $uid GROUP ALL",
                subject_id,
                None,
            )
            .await?;
        Ok(total > 0)
    }

    async fn insert_pending_follow(&self, marker: &PendingFollow) -> StoreResult<()> {
        let data = PendingInsert {
            uid: marker.subject_id,
            date: marker.marked_at,
        };
        self.create(PENDING_TABLE, data).await
    }

    async fn has_unfollow_notification(&self, record: &UnfollowNotification) -> StoreResult<bool> {
        let total = self
            .count(
                "SELECT count() AS total FROM previous_unfollows \
                 WHERE uid = $uid AND unfollower = $other GROUP ALL",
                record.abandoned_user_id,
                Some(record.unfollower_id),
            )
            .await?;
        Ok(total > 0)
    }

    async fn insert_unfollow_notification(&self, record: &UnfollowNotification) -> StoreResult<()> {
        let data = UnfollowInsert {
            uid: record.abandoned_user_id,
            unfollower: record.unfollower_id,
        };
        self.create(UNFOLLOW_TABLE, data).await
    }

    async fn reconnect(&mut self) -> StoreResult<()> {
        tracing::warn!(endpoint = %self.config.endpoint, "Reconnecting document store");
        self.db = Self::open(&self.config).await?;
        Ok(())
    }
}
