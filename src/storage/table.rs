//! In-memory relational tables backing the durable store.
//!
//! Posts, like rows, and comment rows, with the (source, URL) unique index
//! that crawl deduplication relies on.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{CountKind, DedupKey, NewPost, Post, PostId};
use crate::storage::{Comment, CommentId, Page, SearchQuery};

/// Serializable snapshot of every table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostTable {
    #[serde(default)]
    next_post_id: PostId,
    #[serde(default)]
    next_comment_id: CommentId,
    #[serde(default)]
    posts: BTreeMap<PostId, Post>,
    /// (post, user) pairs
    #[serde(default)]
    likes: BTreeSet<(PostId, String)>,
    #[serde(default)]
    comments: BTreeMap<CommentId, Comment>,
    /// Unique index on (source name, source URL); rebuilt after load
    #[serde(skip)]
    keys: HashSet<DedupKey>,
}

impl PostTable {
    /// Rebuild derived indexes after deserialization.
    pub fn reindex(&mut self) {
        self.keys = self.posts.values().map(Post::dedup_key).collect();
        let max_id = self.posts.keys().next_back().copied().unwrap_or(0);
        self.next_post_id = self.next_post_id.max(max_id);
        let max_comment = self.comments.keys().next_back().copied().unwrap_or(0);
        self.next_comment_id = self.next_comment_id.max(max_comment);
    }

    pub fn existing_keys(&self, keys: &[DedupKey]) -> HashSet<DedupKey> {
        keys.iter()
            .filter(|key| self.keys.contains(*key))
            .cloned()
            .collect()
    }

    /// Insert a batch of posts, all or nothing.
    pub fn insert_batch(&mut self, posts: Vec<NewPost>, now: DateTime<Utc>) -> Result<Vec<Post>> {
        let mut batch_keys = HashSet::with_capacity(posts.len());
        for post in &posts {
            let key = post.dedup_key();
            if self.keys.contains(&key) || !batch_keys.insert(key) {
                return Err(AppError::persistence(format!(
                    "duplicate post {} from {}",
                    post.source_url, post.source_name
                )));
            }
        }

        let inserted: Vec<Post> = posts
            .into_iter()
            .map(|new| {
                self.next_post_id += 1;
                Post::from_new(self.next_post_id, new, now)
            })
            .collect();

        for post in &inserted {
            self.keys.insert(post.dedup_key());
            self.posts.insert(post.id, post.clone());
        }
        Ok(inserted)
    }

    pub fn all_posts(&self) -> Vec<Post> {
        self.posts.values().cloned().collect()
    }

    /// Posts in the order of `ids`; unknown ids are skipped.
    pub fn get_posts(&self, ids: &[PostId]) -> Vec<Post> {
        ids.iter()
            .filter_map(|id| self.posts.get(id).cloned())
            .collect()
    }

    pub fn contains(&self, id: PostId) -> bool {
        self.posts.contains_key(&id)
    }

    pub fn count(&self, id: PostId, kind: CountKind) -> u64 {
        match kind {
            CountKind::Like => self
                .likes
                .range((id, String::new())..)
                .take_while(|(post_id, _)| *post_id == id)
                .count() as u64,
            CountKind::Comment => self.comments.values().filter(|c| c.post_id == id).count() as u64,
        }
    }

    /// Record a like. Returns `false` if the user already liked the post.
    pub fn add_like(&mut self, id: PostId, user: &str) -> Result<bool> {
        self.require_post(id)?;
        Ok(self.likes.insert((id, user.to_string())))
    }

    /// Remove a like. Returns `false` if there was none.
    pub fn remove_like(&mut self, id: PostId, user: &str) -> bool {
        self.likes.remove(&(id, user.to_string()))
    }

    pub fn add_comment(
        &mut self,
        id: PostId,
        user: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment> {
        self.require_post(id)?;
        if body.trim().is_empty() {
            return Err(AppError::validation("comment body is empty"));
        }
        self.next_comment_id += 1;
        let comment = Comment {
            id: self.next_comment_id,
            post_id: id,
            user_id: user.to_string(),
            body: body.to_string(),
            created_at: now,
        };
        self.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    pub fn remove_comment(&mut self, id: PostId, comment_id: CommentId) -> bool {
        match self.comments.get(&comment_id) {
            Some(comment) if comment.post_id == id => {
                self.comments.remove(&comment_id);
                true
            }
            _ => false,
        }
    }

    /// Delete a post together with its like and comment rows.
    pub fn delete_post(&mut self, id: PostId) -> bool {
        let Some(post) = self.posts.remove(&id) else {
            return false;
        };
        self.keys.remove(&post.dedup_key());
        self.likes.retain(|(post_id, _)| *post_id != id);
        self.comments.retain(|_, c| c.post_id != id);
        true
    }

    /// Filter by keyword (title or summary) and source, newest id first.
    pub fn search_ids(&self, query: &SearchQuery) -> Page<PostId> {
        let keyword = query.keyword_filter();
        let source = query.source_filter();

        let matching: Vec<PostId> = self
            .posts
            .values()
            .rev()
            .filter(|post| {
                keyword.as_deref().is_none_or(|k| {
                    post.title.to_lowercase().contains(k) || post.summary.to_lowercase().contains(k)
                })
            })
            .filter(|post| {
                source
                    .as_deref()
                    .is_none_or(|s| post.source_name.to_lowercase().contains(s))
            })
            .map(|post| post.id)
            .collect();

        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(query.page.saturating_mul(query.size))
            .take(query.size)
            .collect();

        Page {
            items,
            page: query.page,
            size: query.size,
            total,
        }
    }

    fn require_post(&self, id: PostId) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(AppError::validation(format!("post {id} does not exist")))
        }
    }
}
