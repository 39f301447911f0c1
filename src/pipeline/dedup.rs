//! Deduplication of crawled posts against a batch and the store.
//!
//! A post is identified by its (source name, source URL) key. Within one
//! batch the first occurrence wins; across runs the store's unique index
//! decides.

use std::collections::HashSet;

use crate::error::Result;
use crate::models::{DedupKey, NewPost};
use crate::storage::PostStore;

/// Posts that survived deduplication.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupResult {
    /// Posts not yet in the store, in crawl order
    pub fresh: Vec<NewPost>,
    /// Repeats inside the batch
    pub in_batch: usize,
    /// Posts the store already holds
    pub existing: usize,
}

/// Keep the first post for each key.
pub fn collapse(posts: Vec<NewPost>) -> (Vec<NewPost>, usize) {
    let total = posts.len();
    let mut seen = HashSet::with_capacity(total);
    let unique: Vec<NewPost> = posts
        .into_iter()
        .filter(|post| seen.insert(post.dedup_key()))
        .collect();
    let repeats = total - unique.len();
    (unique, repeats)
}

/// Drop in-batch repeats and posts the store already holds.
///
/// The store is asked once for the whole batch.
pub async fn filter_new(store: &dyn PostStore, posts: Vec<NewPost>) -> Result<DedupResult> {
    let (unique, in_batch) = collapse(posts);
    if unique.is_empty() {
        return Ok(DedupResult {
            in_batch,
            ..DedupResult::default()
        });
    }

    let keys: Vec<DedupKey> = unique.iter().map(NewPost::dedup_key).collect();
    let existing = store.existing_keys(&keys).await?;

    let fresh: Vec<NewPost> = unique
        .into_iter()
        .filter(|post| !existing.contains(&post.dedup_key()))
        .collect();

    Ok(DedupResult {
        fresh,
        in_batch,
        existing: existing.len(),
    })
}
