//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{CountKind, CrawlStrategy};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Cache and ranking settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Daily crawl schedule
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Durable store location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Registered blog sources
    #[serde(default = "defaults::default_sources")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.cache.op_timeout_ms == 0 {
            return Err(AppError::validation("cache.op_timeout_ms must be > 0"));
        }
        if self.scheduler.hour > 23 || self.scheduler.minute > 59 {
            return Err(AppError::validation(format!(
                "scheduler time {:02}:{:02} is out of range",
                self.scheduler.hour, self.scheduler.minute
            )));
        }
        if self.sources.is_empty() {
            return Err(AppError::validation("No sources defined"));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(AppError::validation("source name is empty"));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            if source.strategy == CrawlStrategy::HtmlList && source.selectors.is_none() {
                return Err(AppError::validation(format!(
                    "source '{}' uses html_list but defines no selectors",
                    source.name
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            cache: CacheConfig::default(),
            scheduler: SchedulerConfig::default(),
            storage: StorageConfig::default(),
            sources: defaults::default_sources(),
        }
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay after each source finishes, in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum sources crawled at the same time
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Upper bound on posts taken from a single listing
    #[serde(default = "defaults::max_posts_per_source")]
    pub max_posts_per_source: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
            max_posts_per_source: defaults::max_posts_per_source(),
        }
    }
}

/// Cache key layout and call budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Upper bound for a single cache/sorted-set call, in milliseconds
    #[serde(default = "defaults::op_timeout")]
    pub op_timeout_ms: u64,

    /// Sorted-set key holding the like leaderboard
    #[serde(default = "defaults::ranking_key")]
    pub ranking_key: String,

    /// Key prefix for cached post views
    #[serde(default = "defaults::posts_prefix")]
    pub posts_prefix: String,

    /// Key prefix for cached like counts
    #[serde(default = "defaults::likes_prefix")]
    pub likes_prefix: String,

    /// Key prefix for cached comment counts
    #[serde(default = "defaults::comments_prefix")]
    pub comments_prefix: String,
}

impl CacheConfig {
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    /// Cache key for a post's counter, e.g. `postLikes::42`.
    pub fn count_key(&self, kind: CountKind, post_id: u64) -> String {
        let prefix = match kind {
            CountKind::Like => &self.likes_prefix,
            CountKind::Comment => &self.comments_prefix,
        };
        format!("{prefix}::{post_id}")
    }

    /// Cache key for a post's materialized view, e.g. `posts::42`.
    pub fn post_key(&self, post_id: u64) -> String {
        format!("{}::{}", self.posts_prefix, post_id)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            op_timeout_ms: defaults::op_timeout(),
            ranking_key: defaults::ranking_key(),
            posts_prefix: defaults::posts_prefix(),
            likes_prefix: defaults::likes_prefix(),
            comments_prefix: defaults::comments_prefix(),
        }
    }
}

/// Local time of the daily crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "defaults::schedule_hour")]
    pub hour: u32,

    #[serde(default)]
    pub minute: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            hour: defaults::schedule_hour(),
            minute: 0,
        }
    }
}

/// Durable store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `posts.json`
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
        }
    }
}

/// One blog source entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Stable source name, also stored on every post
    pub name: String,

    pub strategy: CrawlStrategy,

    /// Listing page or feed URL
    pub url: String,

    /// Selectors for `html_list` sources
    #[serde(default)]
    pub selectors: Option<ListSelectors>,
}

/// CSS selectors for an HTML listing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSelectors {
    /// One element per post
    pub row: String,

    /// Title element, relative to the row
    pub title: String,

    /// Link element, relative to the row (defaults to the title element)
    #[serde(default)]
    pub link: Option<String>,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub date: Option<String>,

    /// Attribute carrying the link target
    #[serde(default = "defaults::link_attr")]
    pub link_attr: String,
}

mod defaults {
    use std::path::PathBuf;

    use super::{ListSelectors, SourceConfig};
    use crate::models::CrawlStrategy;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; TechPost/1.0)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        100
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn max_posts_per_source() -> usize {
        50
    }

    // Cache defaults
    pub fn op_timeout() -> u64 {
        500
    }
    pub fn ranking_key() -> String {
        "ranking:likes".into()
    }
    pub fn posts_prefix() -> String {
        "posts".into()
    }
    pub fn likes_prefix() -> String {
        "postLikes".into()
    }
    pub fn comments_prefix() -> String {
        "postComments".into()
    }

    // Scheduler defaults
    pub fn schedule_hour() -> u32 {
        13
    }

    // Storage defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("storage")
    }

    pub fn link_attr() -> String {
        "href".into()
    }

    // Source defaults
    pub fn default_sources() -> Vec<SourceConfig> {
        vec![
            SourceConfig {
                name: "우아한형제들 기술 블로그".to_string(),
                strategy: CrawlStrategy::HtmlList,
                url: "https://techblog.woowahan.com/".to_string(),
                selectors: Some(ListSelectors {
                    row: "div.post-item".to_string(),
                    title: "h2".to_string(),
                    link: Some("a".to_string()),
                    summary: Some("p.post-excerpt".to_string()),
                    date: Some("time.post-author-date".to_string()),
                    link_attr: link_attr(),
                }),
            },
            SourceConfig {
                name: "카카오 기술 블로그".to_string(),
                strategy: CrawlStrategy::HtmlList,
                url: "https://tech.kakao.com/blog".to_string(),
                selectors: Some(ListSelectors {
                    row: "ul.list_post > li".to_string(),
                    title: "strong.tit_post".to_string(),
                    link: Some("a.link_post".to_string()),
                    summary: Some("p.desc_post".to_string()),
                    date: Some("span.txt_date".to_string()),
                    link_attr: link_attr(),
                }),
            },
            SourceConfig {
                name: "컬리 기술 블로그".to_string(),
                strategy: CrawlStrategy::HtmlList,
                url: "https://helloworld.kurly.com/".to_string(),
                selectors: Some(ListSelectors {
                    row: "li.post-card".to_string(),
                    title: "h3.post-title".to_string(),
                    link: Some("a.post-link".to_string()),
                    summary: Some("p.title-summary".to_string()),
                    date: Some("span.post-date".to_string()),
                    link_attr: link_attr(),
                }),
            },
            SourceConfig {
                name: "토스 기술 블로그".to_string(),
                strategy: CrawlStrategy::JsonFeed,
                url: "https://toss.tech/feed.json".to_string(),
                selectors: None,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.crawler.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.crawler.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_source_names() {
        let mut config = Config::default();
        let dup = config.sources[0].clone();
        config.sources.push(dup);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_html_source_without_selectors() {
        let mut config = Config::default();
        config.sources[0].selectors = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [crawler]
            max_concurrent = 2

            [[sources]]
            name = "Example"
            strategy = "json_feed"
            url = "https://example.com/feed.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.crawler.max_concurrent, 2);
        assert_eq!(config.crawler.timeout_secs, 30);
        assert_eq!(config.cache.ranking_key, "ranking:likes");
        assert_eq!(config.scheduler.hour, 13);
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].strategy, CrawlStrategy::JsonFeed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn cache_keys_use_prefixes() {
        let cache = CacheConfig::default();
        assert_eq!(cache.count_key(CountKind::Like, 42), "postLikes::42");
        assert_eq!(cache.count_key(CountKind::Comment, 42), "postComments::42");
        assert_eq!(cache.post_key(42), "posts::42");
    }
}
