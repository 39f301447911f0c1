//! Shared fixtures for unit tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{CountKind, DedupKey, NewPost, Post, PostId};
use crate::storage::{Comment, CommentId, Page, PostStore, SearchQuery};

/// Insert `n` distinct posts and return their ids.
pub async fn seed_posts(store: &dyn PostStore, n: usize) -> Vec<PostId> {
    let offset = store.all_posts().await.unwrap().len();
    let posts = (offset..offset + n)
        .map(|i| NewPost {
            source_name: "Seed Blog".to_string(),
            source_url: format!("https://seed.example.com/posts/{i}"),
            title: format!("Seed post {i}"),
            summary: String::new(),
            published_at: None,
        })
        .collect();
    store
        .insert_batch(posts)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect()
}

/// Store wrapper that counts reads and writes.
///
/// It can also hold back the next `count` result or reject batch inserts
/// for one source.
pub struct CountingStore<S> {
    inner: S,
    count_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
    insert_calls: AtomicUsize,
    count_delay: Mutex<Option<Duration>>,
    rejected_source: Mutex<Option<String>>,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            count_calls: AtomicUsize::new(0),
            lookup_calls: AtomicUsize::new(0),
            insert_calls: AtomicUsize::new(0),
            count_delay: Mutex::new(None),
            rejected_source: Mutex::new(None),
        }
    }

    /// The next `count` reads its value, then waits `delay` before returning.
    pub fn delay_next_count(&self, delay: Duration) {
        *self.count_delay.lock().unwrap() = Some(delay);
    }

    /// Fail every batch insert that carries a post from `source`.
    pub fn reject_inserts_from(&self, source: Option<&str>) {
        *self.rejected_source.lock().unwrap() = source.map(str::to_string);
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    pub fn reset_count_calls(&self) {
        self.count_calls.store(0, Ordering::SeqCst);
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: PostStore> PostStore for CountingStore<S> {
    async fn existing_keys(&self, keys: &[DedupKey]) -> Result<HashSet<DedupKey>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.existing_keys(keys).await
    }

    async fn insert_batch(&self, posts: Vec<NewPost>) -> Result<Vec<Post>> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let rejected = self.rejected_source.lock().unwrap().clone();
        if let Some(source) = rejected {
            if posts.iter().any(|p| p.source_name == source) {
                return Err(AppError::Io(std::io::Error::other("disk full")));
            }
        }
        self.inner.insert_batch(posts).await
    }

    async fn all_posts(&self) -> Result<Vec<Post>> {
        self.inner.all_posts().await
    }

    async fn get_posts(&self, ids: &[PostId]) -> Result<Vec<Post>> {
        self.inner.get_posts(ids).await
    }

    async fn count(&self, id: PostId, kind: CountKind) -> Result<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        let count = self.inner.count(id, kind).await;
        let delay = self.count_delay.lock().unwrap().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        count
    }

    async fn add_like(&self, id: PostId, user: &str) -> Result<bool> {
        self.inner.add_like(id, user).await
    }

    async fn remove_like(&self, id: PostId, user: &str) -> Result<bool> {
        self.inner.remove_like(id, user).await
    }

    async fn add_comment(&self, id: PostId, user: &str, body: &str) -> Result<Comment> {
        self.inner.add_comment(id, user, body).await
    }

    async fn remove_comment(&self, id: PostId, comment_id: CommentId) -> Result<bool> {
        self.inner.remove_comment(id, comment_id).await
    }

    async fn delete_post(&self, id: PostId) -> Result<bool> {
        self.inner.delete_post(id).await
    }

    async fn search_ids(&self, query: &SearchQuery) -> Result<Page<PostId>> {
        self.inner.search_ids(query).await
    }
}
