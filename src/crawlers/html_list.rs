// src/crawlers/html_list.rs

//! Blog listing crawler.
//!
//! Fetches a listing page and extracts posts using configured CSS selectors.

use std::collections::HashSet;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{Crawler, parse_published};
use crate::error::{AppError, Result};
use crate::models::{CrawlStrategy, ListSelectors, NewPost};
use crate::utils::http::fetch_text;
use crate::utils::{normalize_whitespace, resolve_url};

/// Compiled selectors for one parse pass.
struct RowSelectors {
    row: Selector,
    title: Selector,
    link: Option<Selector>,
    summary: Option<Selector>,
    date: Option<Selector>,
}

/// Crawler for blogs that publish an HTML listing of recent posts.
pub struct HtmlListCrawler {
    name: String,
    url: Url,
    selectors: ListSelectors,
    client: reqwest::Client,
    max_posts: usize,
}

impl HtmlListCrawler {
    /// Create a crawler. Fails if the URL or any selector is invalid.
    pub fn new(
        name: impl Into<String>,
        url: &str,
        selectors: ListSelectors,
        client: reqwest::Client,
        max_posts: usize,
    ) -> Result<Self> {
        let crawler = Self {
            name: name.into(),
            url: Url::parse(url)?,
            selectors,
            client,
            max_posts,
        };
        crawler.compile()?;
        Ok(crawler)
    }

    /// Parse a listing document into posts.
    pub fn parse_listing(&self, html: &str) -> Result<Vec<NewPost>> {
        let selectors = self.compile()?;
        let document = Html::parse_document(html);

        let mut seen = HashSet::new();
        let mut posts = Vec::new();
        for row in document.select(&selectors.row) {
            let Some(post) = self.parse_row(&row, &selectors) else {
                continue;
            };
            if seen.insert(post.source_url.clone()) {
                posts.push(post);
            }
            if posts.len() >= self.max_posts {
                break;
            }
        }
        Ok(posts)
    }

    fn parse_row(&self, row: &ElementRef, selectors: &RowSelectors) -> Option<NewPost> {
        let title_elem = row.select(&selectors.title).next()?;
        let title = normalize_whitespace(&title_elem.text().collect::<String>());
        if title.is_empty() {
            return None;
        }

        let attr = self.selectors.link_attr.as_str();
        let raw_link = selectors
            .link
            .as_ref()
            .and_then(|sel| row.select(sel).next())
            .or(Some(title_elem))
            .and_then(|e| e.value().attr(attr))
            .or_else(|| row.value().attr(attr))
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))?;
        let source_url = resolve_url(&self.url, raw_link);

        let summary = selectors
            .summary
            .as_ref()
            .and_then(|sel| row.select(sel).next())
            .map(|e| normalize_whitespace(&e.text().collect::<String>()))
            .unwrap_or_default();

        let published_at = selectors
            .date
            .as_ref()
            .and_then(|sel| row.select(sel).next())
            .and_then(|e| {
                e.value()
                    .attr("datetime")
                    .and_then(parse_published)
                    .or_else(|| parse_published(&e.text().collect::<String>()))
            });

        Some(NewPost {
            source_name: self.name.clone(),
            source_url,
            title,
            summary,
            published_at,
        })
    }

    fn compile(&self) -> Result<RowSelectors> {
        let optional = |s: &Option<String>| s.as_deref().map(Self::parse_selector).transpose();
        Ok(RowSelectors {
            row: Self::parse_selector(&self.selectors.row)?,
            title: Self::parse_selector(&self.selectors.title)?,
            link: optional(&self.selectors.link)?,
            summary: optional(&self.selectors.summary)?,
            date: optional(&self.selectors.date)?,
        })
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

#[async_trait]
impl Crawler for HtmlListCrawler {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn strategy(&self) -> CrawlStrategy {
        CrawlStrategy::HtmlList
    }

    async fn crawl(&self) -> Result<Vec<NewPost>> {
        let html = fetch_text(&self.client, self.url.as_str())
            .await
            .map_err(|e| AppError::crawl(format!("{} ({})", self.name, self.url), e))?;
        let posts = self.parse_listing(&html)?;
        log::debug!("{}: parsed {} posts", self.name, posts.len());
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const LISTING: &str = r#"
        <html><body>
          <ul class="posts">
            <li class="post">
              <a class="link" href="/2026/01/kafka">
                <h2 class="title">  Kafka   at scale </h2>
              </a>
              <p class="summary">How we run
                 Kafka.</p>
              <time datetime="2026-01-05T00:00:00Z">Jan 5</time>
            </li>
            <li class="post">
              <a class="link" href="https://blog.example.com/2026/01/redis">
                <h2 class="title">Redis sorted sets</h2>
              </a>
              <time>2026.01.03</time>
            </li>
            <li class="post">
              <a class="link" href="/2026/01/kafka"><h2 class="title">Kafka at scale</h2></a>
            </li>
            <li class="post">
              <a class="link"><h2 class="title">No link</h2></a>
            </li>
            <li class="post">
              <a class="link" href="/empty"><h2 class="title">   </h2></a>
            </li>
          </ul>
        </body></html>
    "#;

    fn selectors() -> ListSelectors {
        ListSelectors {
            row: "li.post".to_string(),
            title: "h2.title".to_string(),
            link: Some("a.link".to_string()),
            summary: Some("p.summary".to_string()),
            date: Some("time".to_string()),
            link_attr: "href".to_string(),
        }
    }

    fn crawler(max_posts: usize) -> HtmlListCrawler {
        HtmlListCrawler::new(
            "Example Blog",
            "https://blog.example.com/",
            selectors(),
            reqwest::Client::new(),
            max_posts,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_selector_valid() {
        assert!(HtmlListCrawler::parse_selector("div.class").is_ok());
        assert!(HtmlListCrawler::parse_selector("tr:has(a)").is_ok());
    }

    #[test]
    fn test_parse_selector_invalid() {
        assert!(HtmlListCrawler::parse_selector("[[invalid").is_err());
    }

    #[test]
    fn test_new_rejects_invalid_selector() {
        let mut bad = selectors();
        bad.row = "[[invalid".to_string();
        let result = HtmlListCrawler::new(
            "Example Blog",
            "https://blog.example.com/",
            bad,
            reqwest::Client::new(),
            10,
        );
        assert!(matches!(result, Err(AppError::Selector { .. })));
    }

    #[test]
    fn test_parse_listing_extracts_posts() {
        let posts = crawler(10).parse_listing(LISTING).unwrap();
        assert_eq!(posts.len(), 2);

        assert_eq!(posts[0].source_name, "Example Blog");
        assert_eq!(posts[0].title, "Kafka at scale");
        assert_eq!(posts[0].source_url, "https://blog.example.com/2026/01/kafka");
        assert_eq!(posts[0].summary, "How we run Kafka.");
        assert_eq!(
            posts[0].published_at,
            Some(Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap())
        );

        assert_eq!(posts[1].source_url, "https://blog.example.com/2026/01/redis");
        assert_eq!(posts[1].summary, "");
        assert_eq!(
            posts[1].published_at,
            Some(Utc.with_ymd_and_hms(2026, 1, 3, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_listing_respects_cap() {
        let posts = crawler(1).parse_listing(LISTING).unwrap();
        assert_eq!(posts.len(), 1);
    }

    #[test]
    fn test_descriptor() {
        let descriptor = crawler(10).descriptor();
        assert_eq!(descriptor.name, "Example Blog");
        assert_eq!(descriptor.strategy, CrawlStrategy::HtmlList);
    }
}
