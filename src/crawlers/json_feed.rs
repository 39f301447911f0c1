//! JSON Feed crawler (https://jsonfeed.org/version/1.1).

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{Crawler, parse_published};
use crate::error::{AppError, Result};
use crate::models::{CrawlStrategy, NewPost};
use crate::utils::http::fetch_text;
use crate::utils::{normalize_whitespace, resolve_url};

/// Summaries taken from full content are cut to this many characters.
const SUMMARY_CHARS: usize = 300;

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(default)]
    items: Vec<FeedItem>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    external_url: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    content_text: Option<String>,
    #[serde(default)]
    date_published: Option<String>,
}

/// Crawler for blogs exposing a JSON Feed document.
pub struct JsonFeedCrawler {
    name: String,
    url: Url,
    client: reqwest::Client,
    max_posts: usize,
}

impl JsonFeedCrawler {
    pub fn new(
        name: impl Into<String>,
        url: &str,
        client: reqwest::Client,
        max_posts: usize,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            url: Url::parse(url)?,
            client,
            max_posts,
        })
    }

    /// Parse a feed document into posts. Items without a title or URL are skipped.
    pub fn parse_feed(&self, body: &str) -> Result<Vec<NewPost>> {
        let feed: Feed = serde_json::from_str(body)
            .map_err(|e| AppError::crawl(&self.name, format!("invalid feed: {e}")))?;

        let mut seen = HashSet::new();
        let posts = feed
            .items
            .into_iter()
            .filter_map(|item| self.to_post(item))
            .filter(|post| seen.insert(post.source_url.clone()))
            .take(self.max_posts)
            .collect();
        Ok(posts)
    }

    fn to_post(&self, item: FeedItem) -> Option<NewPost> {
        let title = normalize_whitespace(item.title.as_deref().unwrap_or_default());
        if title.is_empty() {
            return None;
        }
        let link = item
            .url
            .or(item.external_url)
            .filter(|u| !u.trim().is_empty())?;

        let summary = match item.summary {
            Some(summary) => normalize_whitespace(&summary),
            None => {
                let text = normalize_whitespace(item.content_text.as_deref().unwrap_or_default());
                text.chars().take(SUMMARY_CHARS).collect()
            }
        };

        Some(NewPost {
            source_name: self.name.clone(),
            source_url: resolve_url(&self.url, link.trim()),
            title,
            summary,
            published_at: item.date_published.as_deref().and_then(parse_published),
        })
    }
}

#[async_trait]
impl Crawler for JsonFeedCrawler {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn strategy(&self) -> CrawlStrategy {
        CrawlStrategy::JsonFeed
    }

    async fn crawl(&self) -> Result<Vec<NewPost>> {
        let body = fetch_text(&self.client, self.url.as_str())
            .await
            .map_err(|e| AppError::crawl(format!("{} ({})", self.name, self.url), e))?;
        self.parse_feed(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const FEED: &str = r#"{
        "version": "https://jsonfeed.org/version/1.1",
        "title": "Example",
        "items": [
            {
                "id": "1",
                "title": "Designing a leaderboard",
                "url": "/posts/leaderboard",
                "summary": "Sorted sets  in practice",
                "date_published": "2026-01-05T09:00:00+09:00"
            },
            {
                "id": "2",
                "title": "No url here"
            },
            {
                "id": "3",
                "title": "Cache aside",
                "external_url": "https://other.example.com/cache-aside",
                "content_text": "Read through the cache first."
            },
            {
                "id": "4",
                "title": "Designing a leaderboard",
                "url": "/posts/leaderboard"
            }
        ]
    }"#;

    fn crawler(max_posts: usize) -> JsonFeedCrawler {
        JsonFeedCrawler::new(
            "Example Feed",
            "https://example.com/feed.json",
            reqwest::Client::new(),
            max_posts,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_feed() {
        let posts = crawler(10).parse_feed(FEED).unwrap();
        assert_eq!(posts.len(), 2);

        assert_eq!(posts[0].source_url, "https://example.com/posts/leaderboard");
        assert_eq!(posts[0].summary, "Sorted sets in practice");
        assert_eq!(
            posts[0].published_at,
            Some(Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap())
        );

        assert_eq!(posts[1].source_url, "https://other.example.com/cache-aside");
        assert_eq!(posts[1].summary, "Read through the cache first.");
        assert_eq!(posts[1].published_at, None);
    }

    #[test]
    fn test_parse_feed_cap() {
        assert_eq!(crawler(1).parse_feed(FEED).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_feed_is_crawl_error() {
        let result = crawler(10).parse_feed("<html>not json</html>");
        assert!(matches!(result, Err(AppError::Crawl { .. })));
    }
}
