//! Cache-aside counters and the like leaderboard.
//!
//! Everything here is a projection of the durable store and can be rebuilt
//! from it at any time:
//!
//! - `CounterCache`: read-through like/comment counts and cached post views
//! - `RankingStore`: score-ordered post ids, score = like count
//! - `CacheCoordinator`: applies like/comment/crawl events to both
//!
//! The backing service is abstracted as `KeyValueCache` + `SortedSet`.
//! `MemoryCache` implements both in process.

mod coordinator;
mod counter;
mod memory;
mod ranking;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};

pub use coordinator::CacheCoordinator;
pub use counter::CounterCache;
pub use memory::MemoryCache;
pub use ranking::RankingStore;

/// String key-value operations of the cache service.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Set only if the key is absent. Returns whether the value was written.
    async fn set_if_absent(&self, key: &str, value: String) -> Result<bool>;

    /// One value slot per key, `None` where the key is absent.
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// Atomically add `delta` to an integer value, treating a missing key as 0.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    /// Remove keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<usize>;
}

/// Sorted-set operations of the cache service.
///
/// `rev_range` orders by score descending, then by member ascending
/// (byte-wise), so equal scores come back in a stable order.
#[async_trait]
pub trait SortedSet: Send + Sync {
    /// Insert or overwrite members with their scores.
    async fn add_all(&self, key: &str, entries: &[(String, f64)]) -> Result<()>;

    /// Insert members that are not present yet. Returns how many were added.
    async fn add_if_absent(&self, key: &str, members: &[String], score: f64) -> Result<usize>;

    /// Add `delta` to a member's score, creating it at 0 first if absent.
    async fn incr_score(&self, key: &str, member: &str, delta: f64) -> Result<f64>;

    /// Up to `count` members starting at rank `offset`, highest score first.
    async fn rev_range(&self, key: &str, offset: usize, count: usize) -> Result<Vec<String>>;

    async fn score(&self, key: &str, member: &str) -> Result<Option<f64>>;

    async fn remove(&self, key: &str, member: &str) -> Result<bool>;

    async fn len(&self, key: &str) -> Result<usize>;
}

/// Run a cache call with an upper time bound; expiry maps to `CacheUnavailable`.
pub async fn bounded<T>(
    limit: Duration,
    op: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(AppError::cache(format!(
            "{op} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}
