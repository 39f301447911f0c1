//! Durable store for posts and the like/comment rows they own.
//!
//! The store is the source of truth. Caches elsewhere only mirror counts
//! derived from it.
//!
//! ## File Layout
//!
//! ```text
//! {data_dir}/
//! └── posts.json    # posts, likes, comments (rewritten atomically)
//! ```

pub mod local;
mod table;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{CountKind, DedupKey, NewPost, Post, PostId};

// Re-export for convenience
pub use local::LocalPostStore;
pub use table::PostTable;

pub type CommentId = u64;

/// A comment row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub user_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Paginated id search filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Substring of title or summary
    pub keyword: Option<String>,
    /// Substring of source name
    pub source: Option<String>,
    /// Zero-based page index
    pub page: usize,
    pub size: usize,
}

impl SearchQuery {
    fn keyword_filter(&self) -> Option<String> {
        Self::filter(self.keyword.as_deref())
    }

    fn source_filter(&self) -> Option<String> {
        Self::filter(self.source.as_deref())
    }

    fn filter(value: Option<&str>) -> Option<String> {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_lowercase)
    }
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            keyword: None,
            source: None,
            page: 0,
            size: 20,
        }
    }
}

/// One page of results plus the unpaged total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total: usize,
}

/// Trait for durable store backends.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Which of `keys` already exist, in a single lookup.
    async fn existing_keys(&self, keys: &[DedupKey]) -> Result<HashSet<DedupKey>>;

    /// Persist a batch of new posts, all or nothing. Ids are assigned here.
    async fn insert_batch(&self, posts: Vec<NewPost>) -> Result<Vec<Post>>;

    async fn all_posts(&self) -> Result<Vec<Post>>;

    /// Posts in the order of `ids`; unknown ids are skipped.
    async fn get_posts(&self, ids: &[PostId]) -> Result<Vec<Post>>;

    /// Canonical count of like or comment rows for a post.
    async fn count(&self, id: PostId, kind: CountKind) -> Result<u64>;

    /// Returns `false` if the user already liked the post.
    async fn add_like(&self, id: PostId, user: &str) -> Result<bool>;

    /// Returns `false` if there was no like to remove.
    async fn remove_like(&self, id: PostId, user: &str) -> Result<bool>;

    async fn add_comment(&self, id: PostId, user: &str, body: &str) -> Result<Comment>;

    /// Remove a comment if it belongs to `id`. Returns whether one was removed.
    async fn remove_comment(&self, id: PostId, comment_id: CommentId) -> Result<bool>;

    /// Delete a post and its like/comment rows. Returns `false` if absent.
    async fn delete_post(&self, id: PostId) -> Result<bool>;

    async fn search_ids(&self, query: &SearchQuery) -> Result<Page<PostId>>;
}
