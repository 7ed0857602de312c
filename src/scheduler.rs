use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::coordinator::ScrapeCoordinator;
use crate::models::{PriceReading, ScrapeFrequency, TrackedProduct};
use crate::tracker::ProductTracker;
use crate::utils::error::{ScrapeError, ScrapeErrorKind};

/// Result of one item in a batch: a reading, or a typed failure.
#[derive(Debug, Clone, Serialize)]
pub enum ScrapeOutcome {
    Success(PriceReading),
    Failure { kind: ScrapeErrorKind, detail: String },
}

impl ScrapeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ScrapeOutcome::Success(_))
    }

    fn from_error(err: &ScrapeError) -> Self {
        ScrapeOutcome::Failure {
            kind: err.kind(),
            detail: err.to_string(),
        }
    }
}

/// Fan-out/fan-in summary for one scheduled run. Exactly one outcome per
/// input item; the batch never silently drops anything.
#[derive(Debug, Default, Serialize)]
pub struct BatchResult {
    pub outcomes: Vec<(i64, ScrapeOutcome)>,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchResult {
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcome_for(&self, product_id: i64) -> Option<&ScrapeOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| *id == product_id)
            .map(|(_, outcome)| outcome)
    }
}

/// Runs a set of due items through the coordinator concurrently, with a
/// bounded in-flight count and full per-item failure isolation. The
/// scheduler does not persist results or decide alerts.
pub struct BatchScheduler {
    coordinator: Arc<ScrapeCoordinator>,
    max_in_flight: usize,
    item_timeout: Duration,
}

impl BatchScheduler {
    pub fn new(
        coordinator: Arc<ScrapeCoordinator>,
        max_in_flight: usize,
        item_timeout: Duration,
    ) -> Self {
        Self {
            coordinator,
            max_in_flight: max_in_flight.max(1),
            item_timeout,
        }
    }

    pub async fn run_batch(&self, items: &[TrackedProduct]) -> BatchResult {
        if items.is_empty() {
            return BatchResult::default();
        }

        let outcomes: Vec<(i64, ScrapeOutcome)> = stream::iter(items.iter().cloned())
            .map(|item| async move { self.scrape_item(&item).await })
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        let succeeded = outcomes.iter().filter(|(_, o)| o.is_success()).count();
        let failed = outcomes.len() - succeeded;
        info!(
            "Completed batch of {} items. Success: {}, Failed: {}",
            outcomes.len(),
            succeeded,
            failed
        );

        BatchResult {
            outcomes,
            succeeded,
            failed,
        }
    }

    async fn scrape_item(&self, item: &TrackedProduct) -> (i64, ScrapeOutcome) {
        // Per-item timeout: a hung fetch becomes this item's failure instead
        // of stalling the whole batch. Dropping the future cancels the
        // in-flight request.
        let scrape = self.coordinator.scrape_one(&item.product_url);
        let outcome = match tokio::time::timeout(self.item_timeout, scrape).await {
            Ok(Ok(reading)) => ScrapeOutcome::Success(reading),
            Ok(Err(err)) => {
                warn!("Failed to scrape product {} ({}): {}", item.name, item.id, err);
                ScrapeOutcome::from_error(&err)
            }
            Err(_) => {
                warn!(
                    "Scrape of product {} ({}) timed out after {:?}",
                    item.name, item.id, self.item_timeout
                );
                ScrapeOutcome::Failure {
                    kind: ScrapeErrorKind::FetchFailed,
                    detail: format!(
                        "timed out after {:?} fetching {}",
                        self.item_timeout, item.product_url
                    ),
                }
            }
        };
        (item.id, outcome)
    }
}

/// Wire up the two periodic triggers. Hourly and daily sets are disjoint and
/// the jobs are independent; each run is bounded by its own batch scheduler.
pub async fn start_scheduled_jobs(
    tracker: Arc<ProductTracker>,
    config: &SchedulerConfig,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let hourly_tracker = Arc::clone(&tracker);
    let hourly = Job::new_async(config.hourly_cron.as_str(), move |_uuid, _lock| {
        let tracker = Arc::clone(&hourly_tracker);
        Box::pin(async move {
            run_frequency(tracker, ScrapeFrequency::Hourly).await;
        })
    })?;
    scheduler.add(hourly).await?;

    let daily_tracker = Arc::clone(&tracker);
    let daily = Job::new_async(config.daily_cron.as_str(), move |_uuid, _lock| {
        let tracker = Arc::clone(&daily_tracker);
        Box::pin(async move {
            run_frequency(tracker, ScrapeFrequency::Daily).await;
        })
    })?;
    scheduler.add(daily).await?;

    scheduler.start().await?;
    info!(
        "Scrape scheduler started (hourly: {:?}, daily: {:?})",
        config.hourly_cron, config.daily_cron
    );

    Ok(scheduler)
}

async fn run_frequency(tracker: Arc<ProductTracker>, frequency: ScrapeFrequency) {
    info!("Starting {} price scraping job", frequency.as_str());
    match tracker.run_due(frequency).await {
        Ok(result) if result.is_empty() => {
            info!("No {} products to scrape", frequency.as_str());
        }
        Ok(result) => {
            info!(
                "Completed {} scraping job. Success: {}, Failed: {}",
                frequency.as_str(),
                result.succeeded,
                result.failed
            );
        }
        Err(err) => {
            error!("{} scraping job failed: {}", frequency.as_str(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchError, PageFetcher};
    use crate::sites::ScraperRegistry;
    use async_trait::async_trait;
    use chrono::Utc;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PAGE: &str = r#"
        <html><body>
            <span id="productTitle">Fixture Product</span>
            <span class="a-price-whole">999</span>
            <div id="availability">In stock</div>
        </body></html>
    "#;

    /// Fetcher that fails for URLs containing a marker and tracks the
    /// maximum number of requests in flight at once.
    struct CountingFetcher {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl CountingFetcher {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for CountingFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if url.contains("broken") {
                Err(FetchError::Status {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                })
            } else {
                Ok(PAGE.to_string())
            }
        }
    }

    fn product(id: i64, url: &str) -> TrackedProduct {
        let now = Utc::now();
        TrackedProduct {
            id,
            name: format!("Product {}", id),
            source_site: "Amazon".to_string(),
            product_url: url.to_string(),
            scrape_frequency: ScrapeFrequency::Hourly,
            target_price: None,
            current_price: None,
            alert_email: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn batch_scheduler(fetcher: Arc<CountingFetcher>, bound: usize) -> BatchScheduler {
        let coordinator = Arc::new(ScrapeCoordinator::new(
            Arc::new(ScraperRegistry::with_default_sites()),
            fetcher,
        ));
        BatchScheduler::new(coordinator, bound, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_empty_batch_is_valid() {
        let scheduler = batch_scheduler(Arc::new(CountingFetcher::new()), 4);
        let result = scheduler.run_batch(&[]).await;
        assert!(result.is_empty());
        assert_eq!(result.succeeded, 0);
        assert_eq!(result.failed, 0);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_affect_other_items() {
        let scheduler = batch_scheduler(Arc::new(CountingFetcher::new()), 4);
        let items = vec![
            product(1, "https://www.amazon.in/dp/B01"),
            product(2, "https://www.amazon.in/dp/B02"),
            product(3, "https://www.amazon.in/dp/broken"),
            product(4, "https://www.amazon.in/dp/B04"),
            product(5, "https://www.amazon.in/dp/B05"),
        ];

        let result = scheduler.run_batch(&items).await;
        assert_eq!(result.outcomes.len(), 5);
        assert_eq!(result.succeeded, 4);
        assert_eq!(result.failed, 1);

        match result.outcome_for(3).unwrap() {
            ScrapeOutcome::Failure { kind, detail } => {
                assert_eq!(*kind, ScrapeErrorKind::FetchFailed);
                assert!(detail.contains("https://www.amazon.in/dp/broken"));
            }
            other => panic!("expected failure for item 3, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unsupported_item_recorded_not_propagated() {
        let scheduler = batch_scheduler(Arc::new(CountingFetcher::new()), 4);
        let items = vec![
            product(1, "https://www.amazon.in/dp/B01"),
            product(2, "https://unknown-store.example/item"),
        ];

        let result = scheduler.run_batch(&items).await;
        assert_eq!(result.succeeded, 1);
        match result.outcome_for(2).unwrap() {
            ScrapeOutcome::Failure { kind, .. } => {
                assert_eq!(*kind, ScrapeErrorKind::UnsupportedSite)
            }
            other => panic!("expected failure for item 2, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrency_stays_within_bound() {
        let fetcher = Arc::new(CountingFetcher::new());
        let scheduler = batch_scheduler(Arc::clone(&fetcher), 3);

        let items: Vec<TrackedProduct> = (1..=12)
            .map(|i| product(i, &format!("https://www.amazon.in/dp/B{:03}", i)))
            .collect();

        let result = scheduler.run_batch(&items).await;
        assert_eq!(result.succeeded, 12);
        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_hung_fetch_becomes_item_timeout_failure() {
        struct HangingFetcher;

        #[async_trait]
        impl PageFetcher for HangingFetcher {
            async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!()
            }
        }

        let coordinator = Arc::new(ScrapeCoordinator::new(
            Arc::new(ScraperRegistry::with_default_sites()),
            Arc::new(HangingFetcher),
        ));
        let scheduler = BatchScheduler::new(coordinator, 2, Duration::from_millis(50));

        let result = scheduler
            .run_batch(&[product(1, "https://www.amazon.in/dp/B0HANG")])
            .await;

        assert_eq!(result.failed, 1);
        match result.outcome_for(1).unwrap() {
            ScrapeOutcome::Failure { kind, detail } => {
                assert_eq!(*kind, ScrapeErrorKind::FetchFailed);
                assert!(detail.contains("timed out"));
            }
            other => panic!("expected timeout failure, got {:?}", other),
        }
    }
}
