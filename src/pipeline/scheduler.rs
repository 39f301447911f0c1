//! Daily crawl schedule.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, Local, TimeZone};

use super::orchestrator::{CrawlOrchestrator, CrawlSummary};
use crate::cache::CacheCoordinator;
use crate::models::SchedulerConfig;

/// Runs `crawl_all` once a day at a fixed local time.
///
/// Failures are logged and never leave the loop; there is no caller to
/// report them to.
pub struct Scheduler {
    orchestrator: Arc<CrawlOrchestrator>,
    coordinator: Arc<CacheCoordinator>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<CrawlOrchestrator>,
        coordinator: Arc<CacheCoordinator>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            orchestrator,
            coordinator,
            config,
        }
    }

    /// Next occurrence of `hour:minute` strictly after `now`, in `now`'s zone.
    ///
    /// Days where the wall-clock time does not exist (a DST gap) are skipped.
    pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32, minute: u32) -> DateTime<Tz> {
        let tz = now.timezone();
        let today = now.date_naive();

        for offset in 0..=2 {
            let Some(candidate) = today
                .checked_add_days(Days::new(offset))
                .and_then(|day| day.and_hms_opt(hour, minute, 0))
                .and_then(|naive| tz.from_local_datetime(&naive).earliest())
            else {
                continue;
            };
            if candidate > *now {
                return candidate;
            }
        }
        now.clone() + chrono::Duration::days(1)
    }

    /// One scheduled cycle: warm the ranking, then crawl everything.
    pub async fn run_once(&self) -> Option<CrawlSummary> {
        if self.coordinator.warm_up().await {
            log::info!("Ranking was empty and has been rebuilt");
        }

        match self.orchestrator.crawl_all().await {
            Ok(summary) => {
                log::info!(
                    "Scheduled crawl done: {} new posts from {} sources",
                    summary.persisted_total(),
                    summary.succeeded()
                );
                Some(summary)
            }
            Err(e) => {
                log::error!("Scheduled crawl failed: {e}");
                None
            }
        }
    }

    /// Loop forever, sleeping until each daily run.
    pub async fn run(&self) {
        log::info!(
            "Scheduler started; daily crawl at {:02}:{:02} local time",
            self.config.hour,
            self.config.minute
        );

        loop {
            let now = Local::now();
            let next = Self::next_run_after(&now, self.config.hour, self.config.minute);
            let wait = (next.clone() - now).to_std().unwrap_or(Duration::ZERO);
            log::info!("Next crawl at {}", next.to_rfc3339());

            tokio::time::sleep(wait).await;
            self.run_once().await;
        }
    }
}
