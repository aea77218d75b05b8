use super::*;
use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use shared::{FollowerSnapshot, UnfollowNotification};
use unfollow_client::ClientResult;

use crate::db::memory::MemoryStore;

const ANA: i64 = 1000;
const BOB: i64 = 6000;

#[derive(Debug, Clone)]
enum FetchReply {
    Followers(Vec<i64>),
    NotAuthorized,
    Empty,
    Fail,
}

#[derive(Debug, Default)]
struct FakeState {
    replies: HashMap<i64, FetchReply>,
    names: HashMap<i64, String>,
    /// user id -> HTTP status returned by the name lookup
    fail_names: HashMap<i64, u16>,
    fail_send: bool,
    verified: usize,
    fetches: Vec<i64>,
    lookups: HashMap<i64, usize>,
    sent: Vec<(String, String)>,
    follows: Vec<i64>,
}

#[derive(Debug, Default)]
struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    fn with_names(names: &[(i64, &str)]) -> Arc<Self> {
        let api = Self::default();
        api.state.lock().unwrap().names = names
            .iter()
            .map(|(id, name)| (*id, name.to_string()))
            .collect();
        Arc::new(api)
    }

    fn reply(&self, user_id: i64, reply: FetchReply) {
        self.state.lock().unwrap().replies.insert(user_id, reply);
    }

    fn fail_name(&self, user_id: i64, status: u16) {
        self.state.lock().unwrap().fail_names.insert(user_id, status);
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().sent.clone()
    }

    fn follows(&self) -> Vec<i64> {
        self.state.lock().unwrap().follows.clone()
    }
}

#[async_trait]
impl GraphApi for FakeApi {
    async fn verify_credentials(&self) -> ClientResult<()> {
        self.state.lock().unwrap().verified += 1;
        Ok(())
    }

    async fn fetch_followers(&self, subject_id: i64, _screen_name: &str) -> ClientResult<FollowerSnapshot> {
        let mut state = self.state.lock().unwrap();
        state.fetches.push(subject_id);
        match state.replies.get(&subject_id).cloned() {
            Some(FetchReply::Followers(ids)) => Ok(FollowerSnapshot::new(subject_id, ids)),
            Some(FetchReply::NotAuthorized) => Err(ClientError::NotAuthorized),
            Some(FetchReply::Empty) => Err(ClientError::EmptyFollowerList {
                subject: subject_id.to_string(),
            }),
            Some(FetchReply::Fail) | None => Err(ClientError::Api {
                status: 500,
                message: "Internal error".to_string(),
            }),
        }
    }

    async fn get_display_name(&self, user_id: i64) -> ClientResult<String> {
        let mut state = self.state.lock().unwrap();
        *state.lookups.entry(user_id).or_default() += 1;
        if let Some(&status) = state.fail_names.get(&user_id) {
            return Err(ClientError::Api {
                status,
                message: "lookup failed".to_string(),
            });
        }
        Ok(state
            .names
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| format!("user{user_id}")))
    }

    async fn send_direct_message(&self, to_screen_name: &str, text: &str) -> ClientResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_send {
            return Err(ClientError::Timeout {
                method: "POST".to_string(),
                url: "/direct_messages/new.json".to_string(),
            });
        }
        state.sent.push((to_screen_name.to_string(), text.to_string()));
        Ok(())
    }

    async fn request_follow(&self, user_id: i64) -> ClientResult<()> {
        self.state.lock().unwrap().follows.push(user_id);
        Ok(())
    }
}

fn live_config() -> CrawlConfig {
    CrawlConfig {
        dry_run: false,
        ignore_users: HashSet::new(),
        message_template: "@{name} unfollowed you".to_string(),
        ..CrawlConfig::default()
    }
}

fn crawler(api: &Arc<FakeApi>, backend: &MemoryStore, config: &CrawlConfig, users: &[i64]) -> Crawler {
    let store = SnapshotStore::new(Box::new(backend.clone()), config.dry_run);
    let mut crawler = Crawler::new(api.clone(), store, config);
    crawler.set_tracked_users(users.to_vec());
    crawler
}

fn seed_snapshot(backend: &MemoryStore, subject_id: i64, followers: &[i64]) {
    backend
        .state()
        .lock()
        .unwrap()
        .snapshots
        .push(FollowerSnapshot::captured_at(subject_id, 0, followers.to_vec()));
}

#[tokio::test]
async fn test_first_run_saves_without_notifying() {
    let api = FakeApi::with_names(&[]);
    api.reply(ANA, FetchReply::Followers(vec![5000, BOB]));
    let backend = MemoryStore::new();

    let summary = crawler(&api, &backend, &live_config(), &[ANA])
        .run()
        .await
        .unwrap();

    assert_eq!(summary.users, 1);
    assert_eq!(summary.unfollows, 0);
    assert!(api.sent().is_empty());
    let state = backend.state();
    let state = state.lock().unwrap();
    assert_eq!(state.snapshots.len(), 1);
    assert_eq!(state.counters.len(), 1);
    assert_eq!(state.counters[0].follower_count, 2);
}

#[tokio::test]
async fn test_unfollow_is_notified_once() {
    let api = FakeApi::with_names(&[(ANA, "ana"), (BOB, "bob")]);
    api.reply(ANA, FetchReply::Followers(vec![5000, 7000]));
    let backend = MemoryStore::new();
    seed_snapshot(&backend, ANA, &[5000, BOB, 7000]);

    let mut crawler = crawler(&api, &backend, &live_config(), &[ANA]);
    let summary = crawler.run().await.unwrap();

    assert_eq!(summary.unfollows, 1);
    assert_eq!(summary.notified, 1);
    assert_eq!(
        api.sent(),
        vec![("ana".to_string(), "@bob unfollowed you".to_string())]
    );

    // Saved snapshot no longer has bob; nothing new to report
    crawler.run().await.unwrap();
    assert_eq!(api.sent().len(), 1);

    let state = backend.state();
    let state = state.lock().unwrap();
    assert_eq!(state.notified, vec![UnfollowNotification::new(ANA, BOB)]);
    assert_eq!(state.snapshots.len(), 3);
}

#[tokio::test]
async fn test_process_unfollow_is_idempotent() {
    let api = FakeApi::with_names(&[(ANA, "ana"), (BOB, "bob")]);
    let backend = MemoryStore::new();
    let mut crawler = crawler(&api, &backend, &live_config(), &[]);

    assert!(crawler.process_unfollow(ANA, BOB).await.unwrap());
    assert!(!crawler.process_unfollow(ANA, BOB).await.unwrap());

    assert_eq!(api.sent().len(), 1);
    assert_eq!(backend.state().lock().unwrap().notified.len(), 1);
}

#[tokio::test]
async fn test_dry_run_has_no_side_effects() {
    let api = FakeApi::with_names(&[(ANA, "ana"), (BOB, "bob")]);
    api.reply(ANA, FetchReply::Followers(vec![5000]));
    api.reply(2000, FetchReply::NotAuthorized);
    let backend = MemoryStore::new();
    seed_snapshot(&backend, ANA, &[5000, BOB]);

    let config = CrawlConfig {
        dry_run: true,
        ..live_config()
    };
    let summary = crawler(&api, &backend, &config, &[ANA, 2000])
        .run()
        .await
        .unwrap();

    // The message is still rendered and counted
    assert_eq!(summary.notified, 1);
    assert_eq!(summary.follow_requests, 1);
    assert!(api.sent().is_empty());
    assert!(api.follows().is_empty());
    assert_eq!(backend.state().lock().unwrap().writes, 0);
}

#[tokio::test]
async fn test_safety_limit_aborts_run() {
    let api = FakeApi::with_names(&[]);
    api.reply(ANA, FetchReply::Followers(vec![]));
    api.reply(2000, FetchReply::Followers(vec![5000]));
    let backend = MemoryStore::new();
    let prior: Vec<i64> = (5000..5100).collect();
    seed_snapshot(&backend, ANA, &prior);

    let err = crawler(&api, &backend, &live_config(), &[ANA, 2000])
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CrawlError::SafetyLimitExceeded {
            user_id: ANA,
            departures: 100,
            limit: 50,
        }
    ));
    assert!(err.is_fatal());
    assert!(api.sent().is_empty());
    assert_eq!(backend.state().lock().unwrap().writes, 0);
    assert_eq!(api.state.lock().unwrap().fetches, vec![ANA]);
}

#[tokio::test]
async fn test_not_authorized_requests_follow_once() {
    let api = FakeApi::with_names(&[]);
    api.reply(ANA, FetchReply::NotAuthorized);
    let backend = MemoryStore::new();

    let mut crawler = crawler(&api, &backend, &live_config(), &[ANA]);
    let summary = crawler.run().await.unwrap();

    assert_eq!(summary.follow_requests, 1);
    assert_eq!(api.follows(), vec![ANA]);
    {
        let state = backend.state();
        let state = state.lock().unwrap();
        assert_eq!(state.pending.len(), 1);
        assert!(state.snapshots.is_empty());
    }

    // Marker suppresses the next attempt
    crawler.run().await.unwrap();
    assert_eq!(api.follows(), vec![ANA]);
}

#[tokio::test]
async fn test_error_budget_aborts_run() {
    let api = FakeApi::with_names(&[]);
    for user in [1001, 1002, 1003, 1004] {
        api.reply(user, FetchReply::Fail);
    }
    let backend = MemoryStore::new();
    let config = CrawlConfig {
        max_errors: 2,
        ..live_config()
    };

    let err = crawler(&api, &backend, &config, &[1001, 1002, 1003, 1004])
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlError::RunAborted { errors: 2 }));
    assert_eq!(api.state.lock().unwrap().fetches, vec![1001, 1002]);
}

#[tokio::test]
async fn test_last_user_exhausting_budget_aborts_run() {
    let api = FakeApi::with_names(&[]);
    api.reply(1001, FetchReply::Fail);
    api.reply(1002, FetchReply::Fail);
    let backend = MemoryStore::new();
    let config = CrawlConfig {
        max_errors: 2,
        ..live_config()
    };

    let err = crawler(&api, &backend, &config, &[1001, 1002])
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlError::RunAborted { errors: 2 }));
}

#[tokio::test]
async fn test_snapshot_save_failure_counts_against_budget() {
    let api = FakeApi::with_names(&[]);
    api.reply(ANA, FetchReply::Followers(vec![5000]));
    api.reply(2000, FetchReply::Followers(vec![5000]));
    let backend = MemoryStore::new();
    backend.state().lock().unwrap().write_faults = 1;
    let config = CrawlConfig {
        max_errors: 1,
        ..live_config()
    };

    let err = crawler(&api, &backend, &config, &[ANA, 2000])
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlError::RunAborted { errors: 1 }));
    assert_eq!(api.state.lock().unwrap().fetches, vec![ANA]);
    assert!(backend.state().lock().unwrap().snapshots.is_empty());
}

#[tokio::test]
async fn test_clean_user_resets_error_count() {
    let api = FakeApi::with_names(&[]);
    api.reply(1001, FetchReply::Fail);
    api.reply(1002, FetchReply::Followers(vec![5000]));
    api.reply(1003, FetchReply::Fail);
    api.reply(1004, FetchReply::Followers(vec![5000]));
    let backend = MemoryStore::new();
    let config = CrawlConfig {
        max_errors: 2,
        ..live_config()
    };

    let summary = crawler(&api, &backend, &config, &[1001, 1002, 1003, 1004])
        .run()
        .await
        .unwrap();

    assert_eq!(summary.users, 4);
    assert_eq!(summary.failures, 2);
}

#[tokio::test]
async fn test_empty_follower_list_is_not_an_error() {
    let api = FakeApi::with_names(&[]);
    api.reply(1001, FetchReply::Empty);
    api.reply(1002, FetchReply::Empty);
    api.reply(1003, FetchReply::Followers(vec![5000]));
    let backend = MemoryStore::new();
    let config = CrawlConfig {
        max_errors: 1,
        ..live_config()
    };

    let summary = crawler(&api, &backend, &config, &[1001, 1002, 1003])
        .run()
        .await
        .unwrap();

    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.failures, 0);
    // Only the non-empty user was saved
    assert_eq!(backend.state().lock().unwrap().snapshots.len(), 1);
}

#[tokio::test]
async fn test_failed_send_is_retried_next_cycle() {
    let api = FakeApi::with_names(&[(ANA, "ana"), (BOB, "bob")]);
    api.reply(ANA, FetchReply::Followers(vec![5000]));
    api.state.lock().unwrap().fail_send = true;
    let backend = MemoryStore::new();
    seed_snapshot(&backend, ANA, &[5000, BOB]);

    let mut crawler = crawler(&api, &backend, &live_config(), &[ANA]);
    let summary = crawler.run().await.unwrap();

    assert_eq!(summary.failures, 1);
    {
        let state = backend.state();
        let state = state.lock().unwrap();
        assert!(state.notified.is_empty());
        // prior snapshot kept so bob is diffed again
        assert_eq!(state.snapshots.len(), 1);
    }

    api.state.lock().unwrap().fail_send = false;
    crawler.run().await.unwrap();

    assert_eq!(api.sent().len(), 1);
    assert_eq!(backend.state().lock().unwrap().notified.len(), 1);
}

#[tokio::test]
async fn test_notifications_disabled() {
    let api = FakeApi::with_names(&[]);
    api.reply(ANA, FetchReply::Followers(vec![5000]));
    let backend = MemoryStore::new();
    seed_snapshot(&backend, ANA, &[5000, BOB]);

    let config = CrawlConfig {
        notify_users: false,
        ..live_config()
    };
    let summary = crawler(&api, &backend, &config, &[ANA])
        .run()
        .await
        .unwrap();

    assert_eq!(summary.unfollows, 1);
    assert_eq!(summary.notified, 0);
    assert!(api.sent().is_empty());
    assert_eq!(backend.state().lock().unwrap().snapshots.len(), 2);
}

#[tokio::test]
async fn test_display_names_are_cached_within_run() {
    let api = FakeApi::with_names(&[(ANA, "ana")]);
    api.reply(ANA, FetchReply::Followers(vec![5000]));
    let backend = MemoryStore::new();
    seed_snapshot(&backend, ANA, &[5000, 6001, 6002, 6003]);

    crawler(&api, &backend, &live_config(), &[ANA])
        .run()
        .await
        .unwrap();

    let state = api.state.lock().unwrap();
    assert_eq!(state.sent.len(), 3);
    assert_eq!(state.lookups[&ANA], 1);
}

#[tokio::test]
async fn test_implausible_ids_trigger_reconnect() {
    let api = FakeApi::with_names(&[]);
    api.reply(ANA, FetchReply::Followers(vec![5000]));
    let backend = MemoryStore::new();
    seed_snapshot(&backend, ANA, &[42, 5000]);

    let summary = crawler(&api, &backend, &live_config(), &[ANA])
        .run()
        .await
        .unwrap();

    assert_eq!(summary.unfollows, 0);
    assert!(api.sent().is_empty());
    assert_eq!(backend.state().lock().unwrap().reconnects, 1);
}

#[tokio::test]
async fn test_ignored_tracked_user_is_not_fetched() {
    let api = FakeApi::with_names(&[]);
    let backend = MemoryStore::new();
    let config = CrawlConfig {
        ignore_users: HashSet::from([ANA]),
        ..live_config()
    };

    let summary = crawler(&api, &backend, &config, &[ANA])
        .run()
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert!(api.state.lock().unwrap().fetches.is_empty());
}

#[tokio::test]
async fn test_find_tracked_users() {
    let api = FakeApi::with_names(&[]);
    api.reply(217554981, FetchReply::Followers(vec![ANA, 2000]));
    let backend = MemoryStore::new();

    let mut crawler = crawler(&api, &backend, &live_config(), &[]);
    let count = crawler.find_tracked_users(217554981).await.unwrap();

    assert_eq!(count, 2);
    assert_eq!(crawler.tracked_users(), &[ANA, 2000]);
    assert_eq!(api.state.lock().unwrap().verified, 1);
    assert_eq!(backend.state().lock().unwrap().snapshots.len(), 1);
}

#[tokio::test]
async fn test_find_tracked_users_tolerates_save_failure() {
    let api = FakeApi::with_names(&[]);
    api.reply(217554981, FetchReply::Followers(vec![ANA]));
    let backend = MemoryStore::new();
    backend.state().lock().unwrap().write_faults = 1;

    let mut crawler = crawler(&api, &backend, &live_config(), &[]);
    crawler.find_tracked_users(217554981).await.unwrap();

    assert_eq!(crawler.tracked_users(), &[ANA]);
}

#[tokio::test]
async fn test_unreadable_prior_snapshot_is_treated_as_first_run() {
    let api = FakeApi::with_names(&[(ANA, "ana"), (BOB, "bob")]);
    api.reply(ANA, FetchReply::Followers(vec![5000]));
    let backend = MemoryStore::new();
    seed_snapshot(&backend, ANA, &[5000, BOB]);
    // fails the read and its retry
    backend.state().lock().unwrap().read_faults = 2;

    let summary = crawler(&api, &backend, &live_config(), &[ANA])
        .run()
        .await
        .unwrap();

    assert_eq!(summary.unfollows, 0);
    assert_eq!(summary.failures, 0);
    assert!(api.sent().is_empty());
    let state = backend.state();
    let state = state.lock().unwrap();
    assert_eq!(state.reconnects, 1);
    assert_eq!(state.snapshots.len(), 2);
}

#[tokio::test]
async fn test_one_failed_unfollow_does_not_stop_the_others() {
    let api = FakeApi::with_names(&[(ANA, "ana")]);
    api.reply(ANA, FetchReply::Followers(vec![5000]));
    api.fail_name(6002, 500);
    let backend = MemoryStore::new();
    seed_snapshot(&backend, ANA, &[5000, 6001, 6002, 6003]);

    let summary = crawler(&api, &backend, &live_config(), &[ANA])
        .run()
        .await
        .unwrap();

    assert_eq!(summary.unfollows, 3);
    assert_eq!(summary.notified, 2);
    assert_eq!(summary.failures, 1);
    assert_eq!(
        api.sent(),
        vec![
            ("ana".to_string(), "@user6001 unfollowed you".to_string()),
            ("ana".to_string(), "@user6003 unfollowed you".to_string()),
        ]
    );
    let state = backend.state();
    let state = state.lock().unwrap();
    assert_eq!(state.notified.len(), 2);
    // 6002 has to come back next cycle
    assert_eq!(state.snapshots.len(), 1);
}

#[tokio::test]
async fn test_deleted_unfollower_does_not_block_snapshot() {
    let api = FakeApi::with_names(&[(ANA, "ana")]);
    api.reply(ANA, FetchReply::Followers(vec![5000]));
    api.fail_name(6002, 404);
    let backend = MemoryStore::new();
    seed_snapshot(&backend, ANA, &[5000, 6001, 6002, 6003]);

    let mut crawler = crawler(&api, &backend, &live_config(), &[ANA]);
    let summary = crawler.run().await.unwrap();

    assert_eq!(summary.unfollows, 3);
    assert_eq!(summary.notified, 2);
    assert_eq!(summary.failures, 0);
    assert_eq!(api.sent().len(), 2);
    assert_eq!(backend.state().lock().unwrap().snapshots.len(), 2);

    // The new snapshot no longer has 6002, so it is not looked up again
    crawler.run().await.unwrap();
    assert_eq!(api.sent().len(), 2);
    assert_eq!(api.state.lock().unwrap().lookups[&6002], 1);
}

#[tokio::test]
async fn test_suspended_unfollower_is_skipped() {
    let api = FakeApi::with_names(&[(ANA, "ana")]);
    api.reply(ANA, FetchReply::Followers(vec![5000]));
    api.fail_name(BOB, 403);
    let backend = MemoryStore::new();
    seed_snapshot(&backend, ANA, &[5000, BOB]);

    let mut crawler = crawler(&api, &backend, &live_config(), &[]);
    assert!(!crawler.process_unfollow(ANA, BOB).await.unwrap());

    assert!(api.sent().is_empty());
    assert!(backend.state().lock().unwrap().notified.is_empty());
}

#[tokio::test]
async fn test_name_lookup_server_error_holds_snapshot() {
    let api = FakeApi::with_names(&[(ANA, "ana")]);
    api.reply(ANA, FetchReply::Followers(vec![5000]));
    api.fail_name(BOB, 503);
    let backend = MemoryStore::new();
    seed_snapshot(&backend, ANA, &[5000, BOB]);

    let mut crawler = crawler(&api, &backend, &live_config(), &[ANA]);
    let summary = crawler.run().await.unwrap();

    assert_eq!(summary.failures, 1);
    assert_eq!(backend.state().lock().unwrap().snapshots.len(), 1);

    // Lookup recovers; bob is diffed again and notified
    api.state.lock().unwrap().fail_names.clear();
    crawler.run().await.unwrap();
    assert_eq!(
        api.sent(),
        vec![("ana".to_string(), "@bob unfollowed you".to_string())]
    );
}
