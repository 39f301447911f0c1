//! Like leaderboard over a sorted set.
//!
//! Members are post ids zero-padded to 20 digits, so the sorted set's
//! member-ascending tie order equals ascending numeric id: among posts with
//! the same like count, the lower id ranks first.

use std::sync::Arc;
use std::time::Duration;

use super::{SortedSet, bounded};
use crate::error::Result;
use crate::models::{CacheConfig, CountKind, Post, PostId};
use crate::storage::PostStore;

fn member(id: PostId) -> String {
    format!("{id:020}")
}

fn parse_member(member: &str) -> Option<PostId> {
    member.parse().ok()
}

/// Score-ordered post ids, score = like count.
pub struct RankingStore {
    set: Arc<dyn SortedSet>,
    store: Arc<dyn PostStore>,
    key: String,
    limit: Duration,
}

impl RankingStore {
    pub fn new(set: Arc<dyn SortedSet>, store: Arc<dyn PostStore>, config: &CacheConfig) -> Self {
        Self {
            set,
            store,
            key: config.ranking_key.clone(),
            limit: config.op_timeout(),
        }
    }

    /// Add one to a post's score, creating the entry if needed.
    pub async fn increment(&self, id: PostId) -> Result<f64> {
        bounded(
            self.limit,
            "zincrby",
            self.set.incr_score(&self.key, &member(id), 1.0),
        )
        .await
    }

    /// Subtract one from a post's score, never going below zero.
    pub async fn decrement(&self, id: PostId) -> Result<f64> {
        let member = member(id);
        let score = bounded(
            self.limit,
            "zincrby",
            self.set.incr_score(&self.key, &member, -1.0),
        )
        .await?;
        if score < 0.0 {
            log::warn!("Ranking score for post {id} went to {score}; clamping at 0");
            let clamped = bounded(
                self.limit,
                "zincrby",
                self.set.incr_score(&self.key, &member, -score),
            )
            .await?;
            return Ok(clamped.max(0.0));
        }
        Ok(score)
    }

    /// Returns whether the post had an entry.
    pub async fn remove(&self, id: PostId) -> Result<bool> {
        bounded(self.limit, "zrem", self.set.remove(&self.key, &member(id))).await
    }

    /// Up to `n` post ids, highest score first.
    pub async fn top_n(&self, n: usize) -> Result<Vec<PostId>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let members = bounded(
            self.limit,
            "zrevrange",
            self.set.rev_range(&self.key, 0, n),
        )
        .await?;

        Ok(members
            .iter()
            .filter_map(|m| {
                let id = parse_member(m);
                if id.is_none() {
                    log::warn!("Skipping malformed ranking member {m:?}");
                }
                id
            })
            .collect())
    }

    pub async fn score(&self, id: PostId) -> Result<Option<f64>> {
        bounded(self.limit, "zscore", self.set.score(&self.key, &member(id))).await
    }

    pub async fn len(&self) -> Result<usize> {
        bounded(self.limit, "zcard", self.set.len(&self.key)).await
    }

    /// Register posts at score 0, leaving existing entries untouched.
    pub async fn add_batch(&self, posts: &[Post]) -> Result<usize> {
        if posts.is_empty() {
            return Ok(0);
        }
        let members: Vec<String> = posts.iter().map(|p| member(p.id)).collect();
        bounded(
            self.limit,
            "zadd nx",
            self.set.add_if_absent(&self.key, &members, 0.0),
        )
        .await
    }

    /// Rebuild from the store when the leaderboard holds no entries.
    ///
    /// Returns `true` if a rebuild happened.
    pub async fn initialize_if_empty(&self) -> Result<bool> {
        if self.len().await? > 0 {
            return Ok(false);
        }

        let posts = self.store.all_posts().await?;
        let mut entries = Vec::with_capacity(posts.len());
        for post in &posts {
            let likes = self.store.count(post.id, CountKind::Like).await?;
            entries.push((member(post.id), likes as f64));
        }

        if !entries.is_empty() {
            bounded(self.limit, "zadd", self.set.add_all(&self.key, &entries)).await?;
        }
        log::info!("Rebuilt like ranking with {} posts", entries.len());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::storage::LocalPostStore;
    use crate::testing::seed_posts;

    async fn setup(posts: usize) -> (Arc<LocalPostStore>, RankingStore, Vec<PostId>) {
        let store = Arc::new(LocalPostStore::in_memory());
        let ids = seed_posts(store.as_ref(), posts).await;
        let ranking = RankingStore::new(
            Arc::new(MemoryCache::new()),
            store.clone(),
            &CacheConfig::default(),
        );
        (store, ranking, ids)
    }

    #[test]
    fn test_member_encoding_sorts_numerically() {
        assert!(member(9) < member(10));
        assert_eq!(parse_member(&member(42)), Some(42));
        assert_eq!(parse_member("abc"), None);
    }

    #[tokio::test]
    async fn test_ordering_after_increments() {
        let (store, ranking, ids) = setup(3).await;
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        let posts = store.get_posts(&ids).await.unwrap();

        assert_eq!(ranking.add_batch(&posts).await.unwrap(), 3);
        ranking.increment(b).await.unwrap();
        ranking.increment(b).await.unwrap();
        ranking.increment(c).await.unwrap();

        assert_eq!(ranking.top_n(3).await.unwrap(), vec![b, c, a]);
        assert_eq!(ranking.top_n(1).await.unwrap(), vec![b]);
        assert!(ranking.top_n(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ties_break_by_lower_id() {
        let (store, ranking, ids) = setup(12).await;
        let posts = store.get_posts(&ids).await.unwrap();
        ranking.add_batch(&posts).await.unwrap();

        let top = ranking.top_n(12).await.unwrap();
        assert_eq!(top, ids);
    }

    #[tokio::test]
    async fn test_add_batch_keeps_existing_scores() {
        let (store, ranking, ids) = setup(2).await;
        ranking.increment(ids[0]).await.unwrap();

        let posts = store.get_posts(&ids).await.unwrap();
        assert_eq!(ranking.add_batch(&posts).await.unwrap(), 1);
        assert_eq!(ranking.score(ids[0]).await.unwrap(), Some(1.0));
        assert_eq!(ranking.score(ids[1]).await.unwrap(), Some(0.0));
    }

    #[tokio::test]
    async fn test_decrement_clamps_and_remove() {
        let (_, ranking, ids) = setup(1).await;
        assert_eq!(ranking.decrement(ids[0]).await.unwrap(), 0.0);
        assert_eq!(ranking.score(ids[0]).await.unwrap(), Some(0.0));

        assert!(ranking.remove(ids[0]).await.unwrap());
        assert!(!ranking.remove(ids[0]).await.unwrap());
        assert_eq!(ranking.score(ids[0]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clamp_undoes_only_the_overshoot() {
        let set = Arc::new(MemoryCache::new());
        let store = Arc::new(LocalPostStore::in_memory());
        let config = CacheConfig::default();
        let ranking = RankingStore::new(set.clone(), store, &config);

        set.add_all(&config.ranking_key, &[(member(7), -2.0)])
            .await
            .unwrap();
        assert_eq!(ranking.decrement(7).await.unwrap(), 0.0);
        assert_eq!(ranking.score(7).await.unwrap(), Some(0.0));

        ranking.increment(7).await.unwrap();
        assert_eq!(ranking.score(7).await.unwrap(), Some(1.0));
    }

    #[tokio::test]
    async fn test_initialize_if_empty_rebuilds_once() {
        let (store, ranking, ids) = setup(3).await;
        store.add_like(ids[1], "alice").await.unwrap();
        store.add_like(ids[1], "bob").await.unwrap();
        store.add_like(ids[2], "alice").await.unwrap();

        assert!(ranking.initialize_if_empty().await.unwrap());
        assert_eq!(ranking.len().await.unwrap(), 3);
        assert_eq!(ranking.score(ids[0]).await.unwrap(), Some(0.0));
        assert_eq!(ranking.score(ids[1]).await.unwrap(), Some(2.0));
        assert_eq!(ranking.score(ids[2]).await.unwrap(), Some(1.0));

        store.add_like(ids[0], "carol").await.unwrap();
        assert!(!ranking.initialize_if_empty().await.unwrap());
        assert_eq!(ranking.score(ids[0]).await.unwrap(), Some(0.0));
    }

    #[tokio::test]
    async fn test_initialize_on_empty_store() {
        let (_, ranking, _) = setup(0).await;
        assert!(ranking.initialize_if_empty().await.unwrap());
        assert_eq!(ranking.len().await.unwrap(), 0);
    }
}
