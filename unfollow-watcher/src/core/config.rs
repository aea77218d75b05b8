use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use unfollow_client::ClientConfig;
use unfollow_client::config::{DEFAULT_API_URL, DEFAULT_TIMEOUT};

/// 默认通知模板，`{name}` 替换为取关者的用户名
pub const DEFAULT_MESSAGE_TEMPLATE: &str = "Xiiii.. você não está mais sendo seguido por @{name} :-(.";

/// 监控配置 - 所有配置项在启动时读取一次
///
/// # 环境变量
///
/// 支持 `.env` 文件，环境变量优先：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | DRY_RUN | true | 只记录日志，不写库、不发私信、不关注 |
/// | NOTIFY_USERS | true | 是否发送取关通知 |
/// | IGNORE_USERS | 118058049 | 忽略的用户 ID (逗号分隔) |
/// | MAX_UNFOLLOWS | 50 | 单用户单轮最多取关数，超过视为数据异常 |
/// | MAX_ERRORS | 5 | 连续失败上限，达到后中止本轮 |
/// | MIN_PLAUSIBLE_ID | 184 | 小于此值的 ID 视为脏数据 |
/// | MESSAGE_TEMPLATE | (葡语默认) | 私信模板，含 `{name}` |
/// | HUB_UID | 217554981 | 中心账号，其粉丝即被监控用户 |
/// | RUN_CONTINUOUSLY | false | 是否循环运行 |
/// | POLL_INTERVAL_SECS | 30 | 两轮之间的间隔(秒) |
/// | DATABASE_URL | ws://127.0.0.1:8000 | SurrealDB 地址 |
/// | DATABASE_NS | unfollow | SurrealDB namespace |
/// | DATABASE | unfollow | SurrealDB database |
/// | DATABASE_USER / DATABASE_PASS | - | root 凭据 (可选) |
/// | TWITTER_API_URL | https://api.twitter.com/1.1 | 远端 API 地址 |
/// | TWITTER_CONSUMER_KEY / TWITTER_CONSUMER_SECRET | - | OAuth consumer |
/// | TWITTER_ACCESS_TOKEN / TWITTER_ACCESS_TOKEN_SECRET | - | OAuth access token |
/// | TWITTER_TIMEOUT_SECS | 10 | 单次请求超时(秒) |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_JSON | false | JSON 格式日志 |
/// | LOG_DIR | - | 日志目录 (存在时写入按天滚动的文件) |
///
/// # 示例
///
/// ```ignore
/// DRY_RUN=false RUN_CONTINUOUSLY=true cargo run -p unfollow-watcher
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 对比与通知策略
    pub crawl: CrawlConfig,
    /// 存储连接
    pub store: StoreConfig,
    /// 远端 API 客户端
    pub twitter: ClientConfig,
    /// 中心账号
    pub hub_uid: i64,
    pub run_continuously: bool,
    pub poll_interval: Duration,
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,
}

/// Diff and side-effect policy for one run
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub dry_run: bool,
    pub notify_users: bool,
    pub ignore_users: HashSet<i64>,
    /// More departures than this in one cycle means the data is broken
    pub max_unfollows: usize,
    /// Consecutive failures tolerated before the run aborts
    pub max_errors: u32,
    /// IDs below this are never real accounts
    pub min_plausible_id: i64,
    pub message_template: String,
}

impl CrawlConfig {
    /// Text sent to the abandoned user
    pub fn render_message(&self, unfollower_name: &str) -> String {
        self.message_template.replace("{name}", unfollower_name)
    }

    pub fn is_ignored(&self, user_id: i64) -> bool {
        self.ignore_users.contains(&user_id)
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            notify_users: true,
            ignore_users: HashSet::from([118058049]),
            max_unfollows: 50,
            max_errors: 5,
            min_plausible_id: 184,
            message_template: DEFAULT_MESSAGE_TEMPLATE.to_string(),
        }
    }
}

/// SurrealDB 连接配置
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// `ws://host:port`, or `mem://` for an in-process engine
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl StoreConfig {
    /// 内存引擎，测试用
    pub fn in_memory() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            namespace: "test".to_string(),
            database: "test".to_string(),
            username: None,
            password: None,
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 未设置或无法解析的变量使用默认值
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意 key-value 来源加载配置
    ///
    /// 常用于测试场景
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let string = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let defaults = CrawlConfig::default();
        let crawl = CrawlConfig {
            dry_run: parsed(&lookup, "DRY_RUN").unwrap_or(defaults.dry_run),
            notify_users: parsed(&lookup, "NOTIFY_USERS").unwrap_or(defaults.notify_users),
            ignore_users: lookup("IGNORE_USERS")
                .map(|v| parse_id_list(&v))
                .unwrap_or(defaults.ignore_users),
            max_unfollows: parsed(&lookup, "MAX_UNFOLLOWS").unwrap_or(defaults.max_unfollows),
            max_errors: parsed(&lookup, "MAX_ERRORS").unwrap_or(defaults.max_errors),
            min_plausible_id: parsed(&lookup, "MIN_PLAUSIBLE_ID").unwrap_or(defaults.min_plausible_id),
            message_template: string("MESSAGE_TEMPLATE").unwrap_or(defaults.message_template),
        };

        let store = StoreConfig {
            endpoint: string("DATABASE_URL").unwrap_or_else(|| "ws://127.0.0.1:8000".into()),
            namespace: string("DATABASE_NS").unwrap_or_else(|| "unfollow".into()),
            database: string("DATABASE").unwrap_or_else(|| "unfollow".into()),
            username: string("DATABASE_USER"),
            password: string("DATABASE_PASS"),
        };

        let twitter = ClientConfig::new(string("TWITTER_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()))
            .with_consumer(
                string("TWITTER_CONSUMER_KEY").unwrap_or_default(),
                string("TWITTER_CONSUMER_SECRET").unwrap_or_default(),
            )
            .with_access_token(
                string("TWITTER_ACCESS_TOKEN").unwrap_or_default(),
                string("TWITTER_ACCESS_TOKEN_SECRET").unwrap_or_default(),
            )
            .with_timeout(
                parsed(&lookup, "TWITTER_TIMEOUT_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_TIMEOUT),
            );

        Self {
            crawl,
            store,
            twitter,
            hub_uid: parsed(&lookup, "HUB_UID").unwrap_or(217554981),
            run_continuously: parsed(&lookup, "RUN_CONTINUOUSLY").unwrap_or(false),
            poll_interval: Duration::from_secs(parsed(&lookup, "POLL_INTERVAL_SECS").unwrap_or(30)),
            log_level: string("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_json: parsed(&lookup, "LOG_JSON").unwrap_or(false),
            log_dir: string("LOG_DIR"),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

/// Parse a comma separated ID list, skipping blanks and junk
pub fn parse_id_list(raw: &str) -> HashSet<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}
