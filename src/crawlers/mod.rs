//! Per-source crawlers and the registry that indexes them by name.
//!
//! - `HtmlListCrawler`: blog listing pages parsed with CSS selectors
//! - `JsonFeedCrawler`: JSON Feed documents
//!
//! Crawlers only produce posts. Deduplication, persistence, and retries
//! belong to the orchestrator.

mod dates;
mod html_list;
mod json_feed;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{Config, CrawlStrategy, NewPost, SourceDescriptor};

pub use dates::parse_published;
pub use html_list::HtmlListCrawler;
pub use json_feed::JsonFeedCrawler;

/// A producer of freshly fetched posts for one source.
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Stable source name, used for registry lookup and as the dedup source.
    fn source_name(&self) -> &str;

    fn strategy(&self) -> CrawlStrategy;

    /// Fetch and parse the source. Posts are neither deduplicated nor persisted.
    async fn crawl(&self) -> Result<Vec<NewPost>>;

    fn descriptor(&self) -> SourceDescriptor {
        SourceDescriptor {
            name: self.source_name().to_string(),
            strategy: self.strategy(),
        }
    }
}

/// Immutable name-indexed set of crawlers, built once at startup.
#[derive(Clone)]
pub struct CrawlerRegistry {
    crawlers: Vec<Arc<dyn Crawler>>,
    by_name: HashMap<String, usize>,
}

impl CrawlerRegistry {
    /// Build a registry, keeping registration order. Duplicate names are rejected.
    pub fn new(crawlers: Vec<Arc<dyn Crawler>>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(crawlers.len());
        for (idx, crawler) in crawlers.iter().enumerate() {
            let name = crawler.source_name().to_string();
            if by_name.insert(name.clone(), idx).is_some() {
                return Err(AppError::config(format!(
                    "crawler '{name}' registered twice"
                )));
            }
        }
        Ok(Self { crawlers, by_name })
    }

    /// Build one crawler per configured source, sharing a single HTTP client.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Result<Self> {
        let max_posts = config.crawler.max_posts_per_source;
        let crawlers = config
            .sources
            .iter()
            .map(|source| -> Result<Arc<dyn Crawler>> {
                match source.strategy {
                    CrawlStrategy::HtmlList => {
                        let selectors = source.selectors.clone().ok_or_else(|| {
                            AppError::config(format!(
                                "source '{}' uses html_list but defines no selectors",
                                source.name
                            ))
                        })?;
                        Ok(Arc::new(HtmlListCrawler::new(
                            &source.name,
                            &source.url,
                            selectors,
                            client.clone(),
                            max_posts,
                        )?))
                    }
                    CrawlStrategy::JsonFeed => Ok(Arc::new(JsonFeedCrawler::new(
                        &source.name,
                        &source.url,
                        client.clone(),
                        max_posts,
                    )?)),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(crawlers)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Crawler>> {
        self.by_name.get(name).map(|&idx| &self.crawlers[idx])
    }

    /// Source names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.crawlers
            .iter()
            .map(|c| c.source_name().to_string())
            .collect()
    }

    pub fn descriptors(&self) -> Vec<SourceDescriptor> {
        self.crawlers.iter().map(|c| c.descriptor()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Crawler>> {
        self.crawlers.iter()
    }

    pub fn len(&self) -> usize {
        self.crawlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crawlers.is_empty()
    }
}
