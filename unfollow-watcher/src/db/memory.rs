//! In-memory backend for tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shared::{FollowerSnapshot, PendingFollow, SnapshotCounter, UnfollowNotification};

use super::{DocumentStore, StoreError, StoreResult};

#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    pub snapshots: Vec<FollowerSnapshot>,
    pub counters: Vec<SnapshotCounter>,
    pub pending: Vec<PendingFollow>,
    pub notified: Vec<UnfollowNotification>,
    pub reconnects: usize,
    /// Number of upcoming reads that fail with a connection error
    pub read_faults: usize,
    /// Number of upcoming reads that fail with a decode error
    pub decode_faults: usize,
    /// Number of upcoming writes that fail
    pub write_faults: usize,
    pub writes: usize,
}

/// Backend whose state stays inspectable after it is boxed
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Arc<Mutex<MemoryState>> {
        self.state.clone()
    }

    fn read(&self) -> StoreResult<std::sync::MutexGuard<'_, MemoryState>> {
        let mut state = self.state.lock().unwrap();
        if state.read_faults > 0 {
            state.read_faults -= 1;
            return Err(StoreError::Connection("connection reset".into()));
        }
        if state.decode_faults > 0 {
            state.decode_faults -= 1;
            return Err(StoreError::Decode("unexpected document shape".into()));
        }
        Ok(state)
    }

    fn write(&self) -> StoreResult<std::sync::MutexGuard<'_, MemoryState>> {
        let mut state = self.state.lock().unwrap();
        if state.write_faults > 0 {
            state.write_faults -= 1;
            return Err(StoreError::Database("write rejected".into()));
        }
        state.writes += 1;
        Ok(state)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn latest_snapshot(&self, subject_id: i64) -> StoreResult<Option<FollowerSnapshot>> {
        let state = self.read()?;
        Ok(state
            .snapshots
            .iter()
            .filter(|s| s.subject_id == subject_id)
            .max_by_key(|s| s.captured_at)
            .cloned())
    }

    async fn insert_snapshot(&self, snapshot: &FollowerSnapshot) -> StoreResult<()> {
        self.write()?.snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn insert_counter(&self, counter: &SnapshotCounter) -> StoreResult<()> {
        self.write()?.counters.push(counter.clone());
        Ok(())
    }

    async fn has_pending_follow(&self, subject_id: i64) -> StoreResult<bool> {
        Ok(self.read()?.pending.iter().any(|p| p.subject_id == subject_id))
    }

    async fn insert_pending_follow(&self, marker: &PendingFollow) -> StoreResult<()> {
        self.write()?.pending.push(marker.clone());
        Ok(())
    }

    async fn has_unfollow_notification(&self, record: &UnfollowNotification) -> StoreResult<bool> {
        Ok(self.read()?.notified.contains(record))
    }

    async fn insert_unfollow_notification(&self, record: &UnfollowNotification) -> StoreResult<()> {
        self.write()?.notified.push(*record);
        Ok(())
    }

    async fn reconnect(&mut self) -> StoreResult<()> {
        self.state.lock().unwrap().reconnects += 1;
        Ok(())
    }
}
