//! Post actions and read views.
//!
//! Writes go to the durable store first; the cache engine is told about
//! them afterwards. Reads go through the cache and fall back to the store.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::CacheCoordinator;
use crate::error::Result;
use crate::models::{CountEntry, CountKind, PostId, PostView};
use crate::storage::{Comment, CommentId, Page, PostStore, SearchQuery};

pub struct PostService {
    store: Arc<dyn PostStore>,
    coordinator: Arc<CacheCoordinator>,
}

impl PostService {
    pub fn new(store: Arc<dyn PostStore>, coordinator: Arc<CacheCoordinator>) -> Self {
        Self { store, coordinator }
    }

    /// Record a like. Returns `false` if the user had already liked the post.
    pub async fn like(&self, id: PostId, user: &str) -> Result<bool> {
        self.prime_like(id).await;
        let added = self.store.add_like(id, user).await?;
        if added {
            self.coordinator.on_like(id).await;
        }
        Ok(added)
    }

    /// Withdraw a like. Returns `false` if there was none.
    pub async fn unlike(&self, id: PostId, user: &str) -> Result<bool> {
        self.prime_like(id).await;
        let removed = self.store.remove_like(id, user).await?;
        if removed {
            self.coordinator.on_unlike(id).await;
        }
        Ok(removed)
    }

    pub async fn add_comment(&self, id: PostId, user: &str, body: &str) -> Result<Comment> {
        self.prime(id, CountKind::Comment).await;
        let comment = self.store.add_comment(id, user, body).await?;
        self.coordinator.on_comment_added(id).await;
        Ok(comment)
    }

    pub async fn remove_comment(&self, id: PostId, comment_id: CommentId) -> Result<bool> {
        self.prime(id, CountKind::Comment).await;
        let removed = self.store.remove_comment(id, comment_id).await?;
        if removed {
            self.coordinator.on_comment_removed(id).await;
        }
        Ok(removed)
    }

    pub async fn delete_post(&self, id: PostId) -> Result<bool> {
        let deleted = self.store.delete_post(id).await?;
        if deleted {
            self.coordinator.on_post_deleted(id).await;
        }
        Ok(deleted)
    }

    /// Current like and comment counts for a post.
    pub async fn counts(&self, id: PostId) -> Result<[CountEntry; 2]> {
        let counters = self.coordinator.counters();
        let (likes, comments) = tokio::join!(
            counters.get(id, CountKind::Like),
            counters.get(id, CountKind::Comment)
        );
        Ok([
            CountEntry {
                post_id: id,
                kind: CountKind::Like,
                count: likes?,
            },
            CountEntry {
                post_id: id,
                kind: CountKind::Comment,
                count: comments?,
            },
        ])
    }

    /// The `n` most liked posts, best first.
    pub async fn popular(&self, n: usize) -> Result<Vec<PostView>> {
        let ranking = self.coordinator.ranking();
        if let Err(e) = ranking.initialize_if_empty().await {
            log::warn!("Ranking rebuild failed: {e}");
        }

        let ids = match ranking.top_n(n).await {
            Ok(ids) => ids,
            Err(e) => {
                log::warn!("Ranking unavailable, ranking from store: {e}");
                self.popular_from_store(n).await?
            }
        };
        self.views(&ids).await
    }

    pub async fn view(&self, id: PostId) -> Result<Option<PostView>> {
        Ok(self.views(&[id]).await?.pop())
    }

    /// Keyword/source search; ids from the store, views through the cache.
    pub async fn search(&self, query: &SearchQuery) -> Result<Page<PostView>> {
        let ids = self.store.search_ids(query).await?;
        let items = self.views(&ids.items).await?;
        Ok(Page {
            items,
            page: ids.page,
            size: ids.size,
            total: ids.total,
        })
    }

    /// Views in the order of `ids`. Cache misses are fetched from the store
    /// in one call and written back; ids with no post are skipped.
    async fn views(&self, ids: &[PostId]) -> Result<Vec<PostView>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let counters = self.coordinator.counters();
        let cached = counters.get_many(ids).await;

        let misses: Vec<PostId> = ids
            .iter()
            .zip(&cached)
            .filter(|(_, view)| view.is_none())
            .map(|(&id, _)| id)
            .collect();

        let mut fetched: HashMap<PostId, PostView> = HashMap::with_capacity(misses.len());
        if !misses.is_empty() {
            for post in self.store.get_posts(&misses).await? {
                let view = PostView::new(&post, 0, 0);
                counters.put_post(&view).await;
                fetched.insert(post.id, view);
            }
        }

        let mut views = Vec::with_capacity(ids.len());
        for (&id, cached) in ids.iter().zip(cached) {
            match cached.or_else(|| fetched.remove(&id)) {
                Some(view) => views.push(view),
                None => log::warn!("Post {id} is ranked or listed but missing from the store"),
            }
        }

        // Cached views hold the post; counts are always read fresh.
        let found: Vec<PostId> = views.iter().map(|v| v.id).collect();
        let (likes, comments) = tokio::join!(
            counters.get_many_counts(&found, CountKind::Like),
            counters.get_many_counts(&found, CountKind::Comment)
        );
        for ((view, likes), comments) in views.iter_mut().zip(likes?).zip(comments?) {
            view.like_count = likes;
            view.comment_count = comments;
        }
        Ok(views)
    }

    async fn popular_from_store(&self, n: usize) -> Result<Vec<PostId>> {
        let mut scored = Vec::new();
        for post in self.store.all_posts().await? {
            scored.push((self.store.count(post.id, CountKind::Like).await?, post.id));
        }
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        Ok(scored.into_iter().take(n).map(|(_, id)| id).collect())
    }

    /// A cold ranking is rebuilt before the like row changes; rebuilding
    /// afterwards would count the like twice.
    async fn prime_like(&self, id: PostId) {
        self.coordinator.warm_up().await;
        self.prime(id, CountKind::Like).await;
    }

    /// Make sure the counter is cached before the row changes, so the
    /// follow-up increment applies to the pre-change count.
    async fn prime(&self, id: PostId, kind: CountKind) {
        if let Err(e) = self.coordinator.counters().get(id, kind).await {
            log::warn!("Could not prime {kind} counter for post {id}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::cache::testing::DownCache;
    use crate::error::AppError;
    use crate::models::CacheConfig;
    use crate::storage::LocalPostStore;
    use crate::testing::{CountingStore, seed_posts};

    async fn setup(n: usize) -> (Arc<CountingStore<LocalPostStore>>, PostService, Vec<PostId>) {
        let store = Arc::new(CountingStore::new(LocalPostStore::in_memory()));
        let ids = seed_posts(store.as_ref(), n).await;
        let coordinator = Arc::new(CacheCoordinator::with_backend(
            Arc::new(MemoryCache::new()),
            store.clone(),
            &CacheConfig::default(),
        ));
        (store.clone(), PostService::new(store, coordinator), ids)
    }

    fn like_count(entries: &[CountEntry; 2]) -> u64 {
        entries[0].count
    }

    fn comment_count(entries: &[CountEntry; 2]) -> u64 {
        entries[1].count
    }

    #[tokio::test]
    async fn test_like_counts_once_per_user() {
        let (_, service, ids) = setup(1).await;
        assert!(service.like(ids[0], "alice").await.unwrap());
        assert!(!service.like(ids[0], "alice").await.unwrap());
        assert!(service.like(ids[0], "bob").await.unwrap());
        assert_eq!(like_count(&service.counts(ids[0]).await.unwrap()), 2);

        assert!(service.unlike(ids[0], "alice").await.unwrap());
        assert!(!service.unlike(ids[0], "alice").await.unwrap());
        assert_eq!(like_count(&service.counts(ids[0]).await.unwrap()), 1);
    }

    #[tokio::test]
    async fn test_cache_matches_store_after_actions() {
        let (store, service, ids) = setup(2).await;
        service.like(ids[0], "alice").await.unwrap();
        service.like(ids[1], "alice").await.unwrap();
        service.like(ids[1], "bob").await.unwrap();
        let comment = service.add_comment(ids[0], "carol", "nice").await.unwrap();
        service.add_comment(ids[0], "dave", "+1").await.unwrap();
        assert!(service.remove_comment(ids[0], comment.id).await.unwrap());
        assert!(!service.remove_comment(ids[1], comment.id).await.unwrap());

        for &id in &ids {
            let counts = service.counts(id).await.unwrap();
            assert_eq!(like_count(&counts), store.count(id, CountKind::Like).await.unwrap());
            assert_eq!(
                comment_count(&counts),
                store.count(id, CountKind::Comment).await.unwrap()
            );
        }
    }

    #[tokio::test]
    async fn test_popular_orders_by_likes() {
        let (_, service, ids) = setup(3).await;
        service.like(ids[1], "alice").await.unwrap();
        service.like(ids[1], "bob").await.unwrap();
        service.like(ids[2], "alice").await.unwrap();

        let top: Vec<PostId> = service.popular(3).await.unwrap().iter().map(|v| v.id).collect();
        assert_eq!(top, vec![ids[1], ids[2], ids[0]]);

        let views = service.popular(1).await.unwrap();
        assert_eq!(views[0].like_count, 2);
    }

    #[tokio::test]
    async fn test_popular_rebuilds_cold_ranking() {
        let store = Arc::new(LocalPostStore::in_memory());
        let ids = seed_posts(store.as_ref(), 2).await;
        store.add_like(ids[1], "alice").await.unwrap();

        let coordinator = Arc::new(CacheCoordinator::with_backend(
            Arc::new(MemoryCache::new()),
            store.clone(),
            &CacheConfig::default(),
        ));
        let service = PostService::new(store, coordinator);
        let top: Vec<PostId> = service.popular(2).await.unwrap().iter().map(|v| v.id).collect();
        assert_eq!(top, vec![ids[1], ids[0]]);
    }

    #[tokio::test]
    async fn test_second_view_hits_cache() {
        let (store, service, ids) = setup(1).await;
        let first = service.view(ids[0]).await.unwrap().unwrap();
        assert_eq!(first.id, ids[0]);

        store.reset_count_calls();
        let second = service.view(ids[0]).await.unwrap().unwrap();
        assert_eq!(second, first);
        assert_eq!(store.count_calls(), 0);
    }

    #[tokio::test]
    async fn test_views_read_counts_in_bulk() {
        let (store, service, _) = setup(3).await;
        let query = SearchQuery {
            size: 10,
            ..SearchQuery::default()
        };

        store.reset_count_calls();
        service.search(&query).await.unwrap();
        assert_eq!(store.count_calls(), 6);

        store.reset_count_calls();
        let page = service.search(&query).await.unwrap();
        assert_eq!(page.items.len(), 3);
        assert_eq!(store.count_calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_post_drops_it_from_popular() {
        let (_, service, ids) = setup(2).await;
        service.like(ids[0], "alice").await.unwrap();
        service.popular(2).await.unwrap();

        assert!(service.delete_post(ids[0]).await.unwrap());
        assert!(!service.delete_post(ids[0]).await.unwrap());

        let top: Vec<PostId> = service.popular(2).await.unwrap().iter().map(|v| v.id).collect();
        assert_eq!(top, vec![ids[1]]);
        assert!(service.view(ids[0]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_returns_views() {
        let (_, service, ids) = setup(3).await;
        service.like(ids[0], "alice").await.unwrap();

        let page = service
            .search(&SearchQuery {
                keyword: Some("seed post".into()),
                size: 2,
                ..SearchQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, ids[2]);
    }

    #[tokio::test]
    async fn test_actions_survive_cache_outage() {
        let store = Arc::new(LocalPostStore::in_memory());
        let ids = seed_posts(store.as_ref(), 2).await;
        let backend = Arc::new(DownCache);
        let coordinator = Arc::new(CacheCoordinator::with_backend(
            backend,
            store.clone(),
            &CacheConfig::default(),
        ));
        let service = PostService::new(store.clone(), coordinator);

        assert!(service.like(ids[1], "alice").await.unwrap());
        assert_eq!(store.count(ids[1], CountKind::Like).await.unwrap(), 1);
        assert_eq!(like_count(&service.counts(ids[1]).await.unwrap()), 1);

        let top: Vec<PostId> = service.popular(2).await.unwrap().iter().map(|v| v.id).collect();
        assert_eq!(top, vec![ids[1], ids[0]]);
    }

    #[tokio::test]
    async fn test_comment_on_missing_post_fails() {
        let (_, service, _) = setup(0).await;
        let result = service.add_comment(42, "alice", "hello").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
