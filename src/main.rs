//! tienda-scout binary - one extraction run per invocation
//!
//! Interval scheduling lives outside this process; the binary loads the
//! configuration, performs a single run and exits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use tienda_scout::engine::governor::SystemProbe;
use tienda_scout::engine::CrawlEngine;
use tienda_scout::infrastructure::config::AppConfig;
use tienda_scout::infrastructure::logging::init_logging;
use tienda_scout::infrastructure::page::HttpFetchEngine;
use tienda_scout::infrastructure::http_client::HttpClientConfig;
use tienda_scout::infrastructure::store::SqliteProductStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref()).context("configuration load failed")?;
    init_logging(&config.logging)?;

    if config.sites.is_empty() {
        anyhow::bail!("no sites configured; nothing to crawl");
    }

    let store = SqliteProductStore::connect(&config.storage.database_url)
        .await
        .context("store connection failed")?;

    let fetch_engine = HttpFetchEngine::new(HttpClientConfig {
        user_agent: config.crawler.user_agent.clone(),
        timeout_seconds: config.crawler.navigation_timeout_secs,
        max_requests_per_second: config.crawler.max_requests_per_second,
        follow_redirects: true,
    });

    let engine = CrawlEngine::new(
        config,
        Arc::new(fetch_engine),
        Arc::new(store),
        Box::new(SystemProbe::new()),
    );

    let report = engine.run().await.context("run failed")?;
    info!(
        processed = report.summary.processed,
        extracted = report.summary.extracted,
        failed = report.summary.failed,
        "done"
    );
    Ok(())
}
