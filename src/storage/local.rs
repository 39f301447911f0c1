//! Local filesystem store implementation.
//!
//! Keeps every table in memory and rewrites `posts.json` after each
//! mutation. A mutation is applied to a copy of the tables first and only
//! becomes visible once the file write succeeds, so a failed write leaves
//! both the file and the in-memory state untouched.
//!
//! `LocalPostStore::in_memory` skips the file entirely (tests, dry runs).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::models::{CountKind, DedupKey, NewPost, Post, PostId};
use crate::storage::{Comment, CommentId, Page, PostStore, PostTable, SearchQuery};

const POSTS_FILE: &str = "posts.json";

/// Local filesystem store backend.
pub struct LocalPostStore {
    table: RwLock<PostTable>,
    root_dir: Option<PathBuf>,
}

impl LocalPostStore {
    /// Open (or create) a store rooted at the given directory.
    pub async fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        let path = root_dir.join(POSTS_FILE);

        let mut table: PostTable = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No {} found in {}, starting empty", POSTS_FILE, root_dir.display());
                PostTable::default()
            }
            Err(e) => return Err(AppError::Io(e)),
        };
        table.reindex();

        Ok(Self {
            table: RwLock::new(table),
            root_dir: Some(root_dir),
        })
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            table: RwLock::new(PostTable::default()),
            root_dir: None,
        }
    }

    /// Apply `f` to a copy of the tables, persist, then publish the copy.
    ///
    /// Every write clones the whole table set and rewrites the file, so a
    /// write costs O(posts + likes + comments). Fine for a local store.
    async fn mutate<T>(&self, f: impl FnOnce(&mut PostTable) -> Result<T> + Send) -> Result<T> {
        let mut table = self.table.write().await;
        let mut next = table.clone();
        let out = f(&mut next)?;

        if let Some(root) = &self.root_dir {
            let bytes = serde_json::to_vec_pretty(&next)?;
            Self::write_bytes(root, POSTS_FILE, &bytes)
                .await
                .map_err(|e| AppError::persistence(format!("writing {POSTS_FILE}: {e}")))?;
        }

        *table = next;
        Ok(out)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(root: &Path, key: &str, bytes: &[u8]) -> Result<()> {
        let path = root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl PostStore for LocalPostStore {
    async fn existing_keys(&self, keys: &[DedupKey]) -> Result<HashSet<DedupKey>> {
        Ok(self.table.read().await.existing_keys(keys))
    }

    async fn insert_batch(&self, posts: Vec<NewPost>) -> Result<Vec<Post>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }
        let now = Utc::now();
        let inserted = self.mutate(move |t| t.insert_batch(posts, now)).await?;
        log::debug!("Persisted {} posts", inserted.len());
        Ok(inserted)
    }

    async fn all_posts(&self) -> Result<Vec<Post>> {
        Ok(self.table.read().await.all_posts())
    }

    async fn get_posts(&self, ids: &[PostId]) -> Result<Vec<Post>> {
        Ok(self.table.read().await.get_posts(ids))
    }

    async fn count(&self, id: PostId, kind: CountKind) -> Result<u64> {
        Ok(self.table.read().await.count(id, kind))
    }

    async fn add_like(&self, id: PostId, user: &str) -> Result<bool> {
        self.mutate(|t| t.add_like(id, user)).await
    }

    async fn remove_like(&self, id: PostId, user: &str) -> Result<bool> {
        self.mutate(|t| Ok(t.remove_like(id, user))).await
    }

    async fn add_comment(&self, id: PostId, user: &str, body: &str) -> Result<Comment> {
        let now = Utc::now();
        self.mutate(|t| t.add_comment(id, user, body, now)).await
    }

    async fn remove_comment(&self, id: PostId, comment_id: CommentId) -> Result<bool> {
        self.mutate(|t| Ok(t.remove_comment(id, comment_id))).await
    }

    async fn delete_post(&self, id: PostId) -> Result<bool> {
        self.mutate(|t| Ok(t.delete_post(id))).await
    }

    async fn search_ids(&self, query: &SearchQuery) -> Result<Page<PostId>> {
        Ok(self.table.read().await.search_ids(query))
    }
}
