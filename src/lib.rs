// src/lib.rs

//! techpost: tech-blog aggregator with cache-aside counters and a like ranking.

pub mod cache;
pub mod crawlers;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod posts;
pub mod storage;
pub mod trigger;
pub mod utils;

#[cfg(test)]
mod testing;
