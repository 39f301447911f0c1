//! Cache-aside like/comment counters and cached post views.

use std::sync::Arc;
use std::time::Duration;

use super::{KeyValueCache, bounded};
use crate::error::Result;
use crate::models::{CacheConfig, CountKind, PostId, PostView};
use crate::storage::PostStore;

/// Read-through mirror of per-post counts.
///
/// The durable store owns the like/comment rows; this only mirrors their
/// counts. Reads degrade to the store when the cache is unreachable.
pub struct CounterCache {
    cache: Arc<dyn KeyValueCache>,
    store: Arc<dyn PostStore>,
    config: CacheConfig,
}

impl CounterCache {
    pub fn new(
        cache: Arc<dyn KeyValueCache>,
        store: Arc<dyn PostStore>,
        config: CacheConfig,
    ) -> Self {
        Self {
            cache,
            store,
            config,
        }
    }

    fn limit(&self) -> Duration {
        self.config.op_timeout()
    }

    /// Cached count, populated from the store on a miss.
    pub async fn get(&self, id: PostId, kind: CountKind) -> Result<u64> {
        let key = self.config.count_key(kind, id);
        match bounded(self.limit(), "get", self.cache.get(&key)).await {
            Ok(Some(raw)) => match raw.parse::<i64>() {
                Ok(value) => return Ok(value.max(0) as u64),
                Err(_) => log::warn!("Ignoring non-numeric cached value at {key}: {raw:?}"),
            },
            Ok(None) => {}
            Err(e) => {
                log::warn!("Cache read failed for {key}, reading store: {e}");
                return self.store.count(id, kind).await;
            }
        }

        self.fill(id, kind, &key).await
    }

    /// Counts for many posts in one cache round trip; misses read through.
    pub async fn get_many_counts(&self, ids: &[PostId], kind: CountKind) -> Result<Vec<u64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = ids.iter().map(|&id| self.config.count_key(kind, id)).collect();
        let raw = match bounded(self.limit(), "mget", self.cache.multi_get(&keys)).await {
            Ok(raw) if raw.len() == ids.len() => raw,
            Ok(raw) => {
                log::warn!("mget returned {} values for {} keys", raw.len(), ids.len());
                vec![None; ids.len()]
            }
            Err(e) => {
                log::warn!("Cache multi-get failed, reading {kind} counts from store: {e}");
                let mut counts = Vec::with_capacity(ids.len());
                for &id in ids {
                    counts.push(self.store.count(id, kind).await?);
                }
                return Ok(counts);
            }
        };

        let mut counts = Vec::with_capacity(ids.len());
        for ((&id, key), value) in ids.iter().zip(&keys).zip(raw) {
            let count = match value.and_then(|v| v.parse::<i64>().ok()) {
                Some(value) => value.max(0) as u64,
                None => self.fill(id, kind, key).await?,
            };
            counts.push(count);
        }
        Ok(counts)
    }

    /// Read the count from the store and cache it unless another writer
    /// got there first, in which case the cached value wins.
    async fn fill(&self, id: PostId, kind: CountKind, key: &str) -> Result<u64> {
        let count = self.store.count(id, kind).await?;
        match bounded(
            self.limit(),
            "setnx",
            self.cache.set_if_absent(key, count.to_string()),
        )
        .await
        {
            Ok(true) => Ok(count),
            Ok(false) => match self.cached(key).await {
                Some(newer) => Ok(newer),
                // Unreadable value; replace it.
                None => {
                    if let Err(e) =
                        bounded(self.limit(), "set", self.cache.set(key, count.to_string())).await
                    {
                        log::warn!("Dropped cache repair for {key}: {e}");
                    }
                    Ok(count)
                }
            },
            Err(e) => {
                log::warn!("Dropped cache fill for {key}: {e}");
                Ok(count)
            }
        }
    }

    async fn cached(&self, key: &str) -> Option<u64> {
        match bounded(self.limit(), "get", self.cache.get(key)).await {
            Ok(Some(raw)) => raw.parse::<i64>().ok().map(|v| v.max(0) as u64),
            Ok(None) => None,
            Err(e) => {
                log::warn!("Cache re-read failed for {key}: {e}");
                None
            }
        }
    }

    /// Add one to the cached count.
    pub async fn increment(&self, id: PostId, kind: CountKind) -> Result<u64> {
        self.adjust(id, kind, 1).await
    }

    /// Subtract one from the cached count, never going below zero.
    pub async fn decrement(&self, id: PostId, kind: CountKind) -> Result<u64> {
        self.adjust(id, kind, -1).await
    }

    async fn adjust(&self, id: PostId, kind: CountKind, delta: i64) -> Result<u64> {
        let key = self.config.count_key(kind, id);
        self.ensure_cached(id, kind, &key).await?;

        let value = bounded(self.limit(), "incr", self.cache.incr_by(&key, delta)).await?;
        if value < 0 {
            log::warn!("{kind} count for post {id} went to {value}; clamping at 0");
            // Undo by delta so a concurrent increment survives the clamp.
            let clamped = bounded(self.limit(), "incr", self.cache.incr_by(&key, -value)).await?;
            return Ok(clamped.max(0) as u64);
        }
        Ok(value as u64)
    }

    /// Populate the key from the store if absent. A value that appeared
    /// concurrently is left alone.
    async fn ensure_cached(&self, id: PostId, kind: CountKind, key: &str) -> Result<()> {
        if bounded(self.limit(), "get", self.cache.get(key)).await?.is_some() {
            return Ok(());
        }
        let count = self.store.count(id, kind).await?;
        bounded(
            self.limit(),
            "setnx",
            self.cache.set_if_absent(key, count.to_string()),
        )
        .await?;
        Ok(())
    }

    /// Drop every cached entry for a post.
    pub async fn evict(&self, id: PostId) -> Result<()> {
        let keys = vec![
            self.config.count_key(CountKind::Like, id),
            self.config.count_key(CountKind::Comment, id),
            self.config.post_key(id),
        ];
        bounded(self.limit(), "del", self.cache.delete(&keys)).await?;
        Ok(())
    }

    /// Cache a materialized post view. Failures are logged and dropped.
    pub async fn put_post(&self, view: &PostView) {
        let key = self.config.post_key(view.id);
        let json = match serde_json::to_string(view) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Could not serialize post {}: {e}", view.id);
                return;
            }
        };
        if let Err(e) = bounded(self.limit(), "set", self.cache.set(&key, json)).await {
            log::warn!("Dropped cache write for {key}: {e}");
        }
    }

    /// Look up many cached views in one round trip.
    ///
    /// The result has one slot per id; `None` marks a miss so the caller can
    /// batch-fetch those from the store.
    pub async fn get_many(&self, ids: &[PostId]) -> Vec<Option<PostView>> {
        let keys: Vec<String> = ids.iter().map(|&id| self.config.post_key(id)).collect();
        let raw = match bounded(self.limit(), "mget", self.cache.multi_get(&keys)).await {
            Ok(raw) if raw.len() == ids.len() => raw,
            Ok(raw) => {
                log::warn!("mget returned {} values for {} keys", raw.len(), ids.len());
                return vec![None; ids.len()];
            }
            Err(e) => {
                log::warn!("Cache multi-get failed, treating all as misses: {e}");
                return vec![None; ids.len()];
            }
        };

        raw.into_iter()
            .map(|value| value.and_then(|json| serde_json::from_str(&json).ok()))
            .collect()
    }
}
