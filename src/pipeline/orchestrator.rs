// src/pipeline/orchestrator.rs

//! Crawl orchestration.
//!
//! Runs the registered crawlers, isolates per-source failures, filters out
//! posts the store already holds, persists the rest in one batch per source
//! and registers them with the ranking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;

use super::dedup;
use crate::cache::CacheCoordinator;
use crate::crawlers::{Crawler, CrawlerRegistry};
use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;
use crate::storage::PostStore;

/// Result of one source's crawl cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Succeeded { fetched: usize, persisted: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: String,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

impl SourceReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Succeeded { .. })
    }

    pub fn persisted(&self) -> usize {
        match self.outcome {
            SourceOutcome::Succeeded { persisted, .. } => persisted,
            SourceOutcome::Failed { .. } => 0,
        }
    }
}

/// Per-source summary of a full crawl, in registration order.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reports: Vec<SourceReport>,
}

impl CrawlSummary {
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> Vec<&SourceReport> {
        self.reports.iter().filter(|r| !r.is_success()).collect()
    }

    pub fn persisted_total(&self) -> usize {
        self.reports.iter().map(SourceReport::persisted).sum()
    }

    pub fn all_failed(&self) -> bool {
        !self.reports.is_empty() && self.succeeded() == 0
    }

    fn log(&self) {
        let elapsed = self.finished_at - self.started_at;
        log::info!(
            "Crawl finished in {}ms: {} succeeded, {} failed, {} new posts",
            elapsed.num_milliseconds(),
            self.succeeded(),
            self.failed().len(),
            self.persisted_total()
        );
        for report in &self.reports {
            match &report.outcome {
                SourceOutcome::Succeeded { fetched, persisted } => {
                    log::info!("  {}: fetched {fetched}, persisted {persisted}", report.source)
                }
                SourceOutcome::Failed { reason } => {
                    log::warn!("  {}: failed: {reason}", report.source)
                }
            }
        }
    }
}

/// Owns the crawler registry and drives crawl cycles against the store.
pub struct CrawlOrchestrator {
    registry: CrawlerRegistry,
    store: Arc<dyn PostStore>,
    coordinator: Arc<CacheCoordinator>,
    /// One lock per registered source, serializing dedup and persist
    locks: HashMap<String, Arc<Mutex<()>>>,
    concurrency: usize,
    delay: Duration,
}

impl CrawlOrchestrator {
    pub fn new(
        registry: CrawlerRegistry,
        store: Arc<dyn PostStore>,
        coordinator: Arc<CacheCoordinator>,
        config: &CrawlerConfig,
    ) -> Self {
        let locks = registry
            .names()
            .into_iter()
            .map(|name| (name, Arc::new(Mutex::new(()))))
            .collect();

        Self {
            registry,
            store,
            coordinator,
            locks,
            concurrency: config.max_concurrent.max(1),
            delay: Duration::from_millis(config.request_delay_ms),
        }
    }

    /// Registered source names in registration order. No I/O.
    pub fn available_sources(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Crawl every source. Fails only if every source failed.
    pub async fn crawl_all(&self) -> Result<CrawlSummary> {
        let started_at = Utc::now();
        log::info!("Crawling {} sources", self.registry.len());

        let mut indexed: Vec<(usize, SourceReport)> =
            stream::iter(self.registry.iter().cloned().enumerate())
                .map(|(idx, crawler)| async move {
                    let source = crawler.source_name().to_string();
                    let outcome = match self.run_source(crawler.as_ref()).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            log::error!("Source {source} failed: {e}");
                            SourceOutcome::Failed {
                                reason: e.to_string(),
                            }
                        }
                    };
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    (idx, SourceReport { source, outcome })
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
        indexed.sort_by_key(|(idx, _)| *idx);

        let summary = CrawlSummary {
            started_at,
            finished_at: Utc::now(),
            reports: indexed.into_iter().map(|(_, report)| report).collect(),
        };
        summary.log();

        if summary.all_failed() {
            let failed = summary
                .reports
                .iter()
                .filter_map(|r| match &r.outcome {
                    SourceOutcome::Failed { reason } => Some(format!("{}: {reason}", r.source)),
                    SourceOutcome::Succeeded { .. } => None,
                })
                .collect();
            return Err(AppError::AllSourcesFailed { failed });
        }
        Ok(summary)
    }

    /// Crawl one registered source. An unknown name fails before any I/O.
    pub async fn crawl_by_source(&self, name: &str) -> Result<SourceReport> {
        let crawler = self
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::UnknownSource(name.to_string()))?;

        let outcome = self.run_source(crawler.as_ref()).await.inspect_err(|e| {
            log::error!("Source {name} failed: {e}");
        })?;

        let report = SourceReport {
            source: name.to_string(),
            outcome,
        };
        log::info!("Crawled {name}: {} new posts", report.persisted());
        Ok(report)
    }

    async fn run_source(&self, crawler: &dyn Crawler) -> Result<SourceOutcome> {
        let name = crawler.source_name();
        let mut posts = crawler.crawl().await?;
        let fetched = posts.len();
        for post in &mut posts {
            if post.source_name != name {
                post.source_name = name.to_string();
            }
        }

        let lock = self
            .locks
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::UnknownSource(name.to_string()))?;
        let _guard = lock.lock().await;

        let filtered = dedup::filter_new(self.store.as_ref(), posts).await?;
        log::debug!(
            "{name}: {fetched} fetched, {} repeated in batch, {} already stored",
            filtered.in_batch,
            filtered.existing
        );

        let persisted = if filtered.fresh.is_empty() {
            Vec::new()
        } else {
            self.store
                .insert_batch(filtered.fresh)
                .await
                .map_err(|e| match e {
                    AppError::Persistence(_) => e,
                    other => AppError::persistence(other),
                })?
        };

        self.coordinator.on_posts_crawled(&persisted).await;

        Ok(SourceOutcome::Succeeded {
            fetched,
            persisted: persisted.len(),
        })
    }
}
