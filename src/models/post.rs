// src/models/post.rs

//! Post data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque post identifier assigned by the durable store.
pub type PostId = u64;

/// The (source name, source URL) pair that identifies a post across crawls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupKey {
    pub source_name: String,
    pub source_url: String,
}

impl DedupKey {
    pub fn new(source_name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            source_url: source_url.into(),
        }
    }
}

/// A freshly crawled post that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    /// Name of the source that produced this post
    pub source_name: String,

    /// Canonical URL of the post on its source
    pub source_url: String,

    /// Post title
    pub title: String,

    /// Summary or leading body text (may be empty)
    #[serde(default)]
    pub summary: String,

    /// Publication time reported by the source, if any
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl NewPost {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(&self.source_name, &self.source_url)
    }
}

/// A persisted post. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub summary: String,
    pub source_name: String,
    pub source_url: String,
    /// Publication time, falling back to ingestion time when the source has none
    pub published_at: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
}

impl Post {
    /// Materialize a crawled post with its store-assigned id.
    pub fn from_new(id: PostId, new: NewPost, ingested_at: DateTime<Utc>) -> Self {
        Self {
            id,
            published_at: new.published_at.unwrap_or(ingested_at),
            title: new.title,
            summary: new.summary,
            source_name: new.source_name,
            source_url: new.source_url,
            ingested_at,
        }
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(&self.source_name, &self.source_url)
    }
}

/// Read-side presentation of a post, cached whole to serve list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostView {
    pub id: PostId,
    pub title: String,
    pub summary: String,
    pub source_name: String,
    pub source_url: String,
    pub published_at: DateTime<Utc>,
    pub like_count: u64,
    pub comment_count: u64,
}

impl PostView {
    pub fn new(post: &Post, like_count: u64, comment_count: u64) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            summary: post.summary.clone(),
            source_name: post.source_name.clone(),
            source_url: post.source_url.clone(),
            published_at: post.published_at,
            like_count,
            comment_count,
        }
    }
}
