//! Unfollow Watcher - 取关检测与通知
//!
//! # 架构概述
//!
//! - **配置** (`core`): 环境变量 + `.env`
//! - **存储** (`db`): SurrealDB 快照与去重记录
//! - **对比** (`crawler`): 快照对比、通知、follow-back、错误预算
//! - **工具** (`utils`): 日志
//!
//! # 模块结构
//!
//! ```text
//! unfollow-watcher/src/
//! ├── core/          # 配置
//! ├── db/            # 存储层
//! ├── crawler/       # 对比与副作用
//! └── utils/         # 日志
//! ```

pub mod core;
pub mod crawler;
pub mod db;
pub mod utils;

// Re-export 公共类型
pub use crate::core::{Config, CrawlConfig, StoreConfig};
pub use crawler::{CrawlError, CrawlResult, Crawler, RunSummary, UserOutcome};
pub use db::{DocumentStore, SnapshotStore, StoreError, StoreResult, SurrealStore};

// Re-export logger functions
pub use utils::logger::init_logger_with_file;
