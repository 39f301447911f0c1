//! In-process cache service.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KeyValueCache, SortedSet};
use crate::error::{AppError, Result};

/// Total order over scores so they can key a `BTreeSet`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Score(f64);

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// One sorted set: member → score, plus a rank index ordered
/// by score descending then member ascending.
#[derive(Debug, Default)]
struct Ranked {
    scores: HashMap<String, f64>,
    index: BTreeSet<(Reverse<Score>, String)>,
}

impl Ranked {
    fn set(&mut self, member: &str, score: f64) {
        if let Some(old) = self.scores.insert(member.to_string(), score) {
            self.index.remove(&(Reverse(Score(old)), member.to_string()));
        }
        self.index.insert((Reverse(Score(score)), member.to_string()));
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(old) => {
                self.index.remove(&(Reverse(Score(old)), member.to_string()));
                true
            }
            None => false,
        }
    }
}

/// Cache service held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryCache {
    values: RwLock<HashMap<String, String>>,
    sets: RwLock<HashMap<String, Ranked>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: String) -> Result<bool> {
        let mut values = self.values.write().await;
        if values.contains_key(key) {
            return Ok(false);
        }
        values.insert(key.to_string(), value);
        Ok(true)
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let values = self.values.read().await;
        Ok(keys.iter().map(|k| values.get(k).cloned()).collect())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut values = self.values.write().await;
        let current = match values.get(key) {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                AppError::cache(format!("value at '{key}' is not an integer"))
            })?,
            None => 0,
        };
        let next = current + delta;
        values.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    async fn delete(&self, keys: &[String]) -> Result<usize> {
        let mut values = self.values.write().await;
        Ok(keys.iter().filter(|k| values.remove(*k).is_some()).count())
    }
}

#[async_trait]
impl SortedSet for MemoryCache {
    async fn add_all(&self, key: &str, entries: &[(String, f64)]) -> Result<()> {
        let mut sets = self.sets.write().await;
        let set = sets.entry(key.to_string()).or_default();
        for (member, score) in entries {
            set.set(member, *score);
        }
        Ok(())
    }

    async fn add_if_absent(&self, key: &str, members: &[String], score: f64) -> Result<usize> {
        let mut sets = self.sets.write().await;
        let set = sets.entry(key.to_string()).or_default();
        let mut added = 0;
        for member in members {
            if !set.scores.contains_key(member) {
                set.set(member, score);
                added += 1;
            }
        }
        Ok(added)
    }

    async fn incr_score(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
        let mut sets = self.sets.write().await;
        let set = sets.entry(key.to_string()).or_default();
        let next = set.scores.get(member).copied().unwrap_or(0.0) + delta;
        set.set(member, next);
        Ok(next)
    }

    async fn rev_range(&self, key: &str, offset: usize, count: usize) -> Result<Vec<String>> {
        let sets = self.sets.read().await;
        Ok(sets
            .get(key)
            .map(|set| {
                set.index
                    .iter()
                    .skip(offset)
                    .take(count)
                    .map(|(_, member)| member.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let sets = self.sets.read().await;
        Ok(sets.get(key).and_then(|set| set.scores.get(member).copied()))
    }

    async fn remove(&self, key: &str, member: &str) -> Result<bool> {
        let mut sets = self.sets.write().await;
        let Some(set) = sets.get_mut(key) else {
            return Ok(false);
        };
        let removed = set.remove(member);
        if set.scores.is_empty() {
            sets.remove(key);
        }
        Ok(removed)
    }

    async fn len(&self, key: &str) -> Result<usize> {
        let sets = self.sets.read().await;
        Ok(sets.get(key).map_or(0, |set| set.scores.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_values() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("a").await.unwrap(), None);

        cache.set("a", "1".into()).await.unwrap();
        assert!(!cache.set_if_absent("a", "9".into()).await.unwrap());
        assert!(cache.set_if_absent("b", "2".into()).await.unwrap());

        let got = cache
            .multi_get(&["a".into(), "x".into(), "b".into()])
            .await
            .unwrap();
        assert_eq!(got, vec![Some("1".to_string()), None, Some("2".to_string())]);

        assert_eq!(cache.delete(&["a".into(), "x".into()]).await.unwrap(), 1);
        assert_eq!(cache.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_incr_by() {
        let cache = MemoryCache::new();
        assert_eq!(cache.incr_by("n", 1).await.unwrap(), 1);
        assert_eq!(cache.incr_by("n", 5).await.unwrap(), 6);
        assert_eq!(cache.incr_by("n", -7).await.unwrap(), -1);

        cache.set("s", "abc".into()).await.unwrap();
        assert!(cache.incr_by("s", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_sorted_set_order_and_ties() {
        let cache = MemoryCache::new();
        cache
            .add_all(
                "r",
                &[("b".into(), 1.0), ("a".into(), 1.0), ("c".into(), 3.0)],
            )
            .await
            .unwrap();

        assert_eq!(cache.rev_range("r", 0, 10).await.unwrap(), vec!["c", "a", "b"]);
        assert_eq!(cache.rev_range("r", 1, 1).await.unwrap(), vec!["a"]);

        assert_eq!(cache.incr_score("r", "b", 5.0).await.unwrap(), 6.0);
        assert_eq!(cache.rev_range("r", 0, 2).await.unwrap(), vec!["b", "c"]);
        assert_eq!(cache.len("r").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_sorted_set_add_if_absent_and_remove() {
        let cache = MemoryCache::new();
        cache.incr_score("r", "a", 2.0).await.unwrap();

        let added = cache
            .add_if_absent("r", &["a".into(), "b".into()], 0.0)
            .await
            .unwrap();
        assert_eq!(added, 1);
        assert_eq!(cache.score("r", "a").await.unwrap(), Some(2.0));
        assert_eq!(cache.score("r", "b").await.unwrap(), Some(0.0));

        assert!(cache.remove("r", "a").await.unwrap());
        assert!(!cache.remove("r", "a").await.unwrap());
        assert!(cache.remove("r", "b").await.unwrap());
        assert_eq!(cache.len("r").await.unwrap(), 0);
        assert!(cache.rev_range("r", 0, 10).await.unwrap().is_empty());
    }
}
