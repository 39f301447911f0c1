//! Crawl pipeline entry points.
//!
//! - `CrawlOrchestrator`: run all sources or one by name, dedup, persist
//! - `Scheduler`: the daily `crawl_all` trigger

pub mod dedup;
pub mod orchestrator;
pub mod scheduler;

pub use orchestrator::{CrawlOrchestrator, CrawlSummary, SourceOutcome, SourceReport};
pub use scheduler::Scheduler;
