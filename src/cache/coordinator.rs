//! Applies like, comment, and crawl events to the counters and the ranking.
//!
//! Each event updates both structures independently. A failed cache update
//! is logged and dropped so the triggering action still succeeds; the next
//! read-through or ranking rebuild repairs the projection.

use std::sync::Arc;

use crate::cache::{CounterCache, KeyValueCache, RankingStore, SortedSet};
use crate::error::Result;
use crate::models::{CacheConfig, CountKind, Post, PostId};
use crate::storage::PostStore;

pub struct CacheCoordinator {
    counters: CounterCache,
    ranking: RankingStore,
}

impl CacheCoordinator {
    pub fn new(counters: CounterCache, ranking: RankingStore) -> Self {
        Self { counters, ranking }
    }

    /// Wire counters and ranking to one backend that provides both interfaces.
    pub fn with_backend<B>(backend: Arc<B>, store: Arc<dyn PostStore>, config: &CacheConfig) -> Self
    where
        B: KeyValueCache + SortedSet + 'static,
    {
        let counters = CounterCache::new(backend.clone(), store.clone(), config.clone());
        let ranking = RankingStore::new(backend, store, config);
        Self::new(counters, ranking)
    }

    pub fn counters(&self) -> &CounterCache {
        &self.counters
    }

    pub fn ranking(&self) -> &RankingStore {
        &self.ranking
    }

    pub async fn on_like(&self, id: PostId) {
        let (count, rank) = tokio::join!(
            self.counters.increment(id, CountKind::Like),
            self.ranking.increment(id)
        );
        Self::report("like counter", id, count);
        Self::report("like ranking", id, rank);
    }

    pub async fn on_unlike(&self, id: PostId) {
        let (count, rank) = tokio::join!(
            self.counters.decrement(id, CountKind::Like),
            self.ranking.decrement(id)
        );
        Self::report("like counter", id, count);
        Self::report("like ranking", id, rank);
    }

    /// Comments affect the counter only; the ranking is like-driven.
    pub async fn on_comment_added(&self, id: PostId) {
        let count = self.counters.increment(id, CountKind::Comment).await;
        Self::report("comment counter", id, count);
    }

    pub async fn on_comment_removed(&self, id: PostId) {
        let count = self.counters.decrement(id, CountKind::Comment).await;
        Self::report("comment counter", id, count);
    }

    /// Eviction hook for a deleted post.
    pub async fn on_post_deleted(&self, id: PostId) {
        let (evicted, removed) = tokio::join!(self.counters.evict(id), self.ranking.remove(id));
        Self::report("cache eviction", id, evicted);
        Self::report("ranking removal", id, removed);
    }

    /// Register freshly persisted posts in the ranking at score 0.
    pub async fn on_posts_crawled(&self, posts: &[Post]) {
        if posts.is_empty() {
            return;
        }
        // A cold ranking is rebuilt first; otherwise it would turn non-empty
        // holding only these posts and never be rebuilt.
        if let Err(e) = self.ranking.initialize_if_empty().await {
            log::warn!("Ranking warm-up before crawl registration failed: {e}");
        }
        match self.ranking.add_batch(posts).await {
            Ok(added) => log::debug!("Registered {added} new posts in ranking"),
            Err(e) => log::warn!("Dropped ranking registration of {} posts: {e}", posts.len()),
        }
    }

    /// Rebuild the ranking if it is empty. Never fails.
    pub async fn warm_up(&self) -> bool {
        match self.ranking.initialize_if_empty().await {
            Ok(rebuilt) => rebuilt,
            Err(e) => {
                log::warn!("Ranking warm-up failed: {e}");
                false
            }
        }
    }

    fn report<T>(what: &str, id: PostId, result: Result<T>) {
        if let Err(e) = result {
            log::warn!("Dropped {what} update for post {id}: {e}");
        }
    }
}
