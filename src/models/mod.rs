// src/models/mod.rs

//! Domain models for the aggregator.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod post;
mod source;

// Re-export all public types
pub use config::{
    CacheConfig, Config, CrawlerConfig, ListSelectors, SchedulerConfig, SourceConfig,
    StorageConfig,
};
pub use post::{DedupKey, NewPost, Post, PostId, PostView};
pub use source::{CountEntry, CountKind, CrawlStrategy, SourceDescriptor};
