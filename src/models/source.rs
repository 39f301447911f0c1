//! Source descriptors and derived counters.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::PostId;

/// How a source is fetched and parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStrategy {
    /// HTML listing page parsed with CSS selectors
    HtmlList,
    /// JSON Feed document (jsonfeed.org)
    JsonFeed,
}

impl CrawlStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlStrategy::HtmlList => "html_list",
            CrawlStrategy::JsonFeed => "json_feed",
        }
    }
}

impl fmt::Display for CrawlStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered source: its stable name and how it is crawled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    pub strategy: CrawlStrategy,
}

/// Kind of derived counter kept per post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountKind {
    Like,
    Comment,
}

impl fmt::Display for CountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountKind::Like => f.write_str("like"),
            CountKind::Comment => f.write_str("comment"),
        }
    }
}

/// A single derived counter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountEntry {
    pub post_id: PostId,
    pub kind: CountKind,
    pub count: u64,
}
