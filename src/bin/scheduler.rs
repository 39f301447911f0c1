//! Scheduler daemon for techpost
//!
//! Crawls every configured source once a day. Failures are logged as JSON
//! and never stop the loop.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use techpost::{
    cache::{CacheCoordinator, MemoryCache},
    crawlers::CrawlerRegistry,
    error::Result,
    models::Config,
    pipeline::{CrawlOrchestrator, Scheduler},
    storage::{LocalPostStore, PostStore},
    utils::http,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config_path = std::env::var("TECHPOST_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));
    let config = Config::load_or_default(&config_path);
    if let Err(e) = config.validate() {
        error!("Invalid configuration in {}: {}", config_path.display(), e);
        return Err(e);
    }

    info!(
        sources = config.sources.len(),
        hour = config.scheduler.hour,
        minute = config.scheduler.minute,
        "techpost scheduler starting"
    );

    let store: Arc<dyn PostStore> = Arc::new(LocalPostStore::open(&config.storage.data_dir).await?);
    let coordinator = Arc::new(CacheCoordinator::with_backend(
        Arc::new(MemoryCache::new()),
        store.clone(),
        &config.cache,
    ));

    let client = http::create_async_client(&config.crawler)?;
    let registry = CrawlerRegistry::from_config(&config, client)?;
    let orchestrator = Arc::new(CrawlOrchestrator::new(
        registry,
        store,
        coordinator.clone(),
        &config.crawler,
    ));

    Scheduler::new(orchestrator, coordinator, config.scheduler.clone())
        .run()
        .await;
    Ok(())
}
