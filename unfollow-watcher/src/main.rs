use std::sync::Arc;

use anyhow::Context;
use unfollow_watcher::{Config, Crawler, SnapshotStore, SurrealStore, init_logger_with_file};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境变量 (.env 可选)
    dotenv::dotenv().ok();

    // 2. 加载配置
    let config = Config::from_env();

    // 3. 日志
    init_logger_with_file(
        Some(config.log_level.as_str()),
        config.log_json,
        config.log_dir.as_deref(),
    );

    tracing::info!(
        dry_run = config.crawl.dry_run,
        notify_users = config.crawl.notify_users,
        hub_uid = config.hub_uid,
        "Unfollow watcher starting"
    );

    // 4. 远端客户端与存储
    let api = Arc::new(config.twitter.build().context("failed to build API client")?);
    let backend = SurrealStore::connect(&config.store)
        .await
        .context("failed to connect to document store")?;
    let store = SnapshotStore::new(Box::new(backend), config.crawl.dry_run);

    let mut crawler = Crawler::new(api, store, &config.crawl);

    // 5. 主循环
    loop {
        if let Err(e) = crawler.find_tracked_users(config.hub_uid).await {
            tracing::error!(error = %e, "Failed to refresh tracked users");
        }

        // SafetyLimitExceeded / RunAborted 以非零退出码结束进程
        crawler.run().await?;

        if !config.run_continuously {
            break;
        }
        tokio::time::sleep(config.poll_interval).await;
    }

    Ok(())
}
