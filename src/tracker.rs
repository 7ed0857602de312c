use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use url::Url;
use validator::{Validate, ValidationError};

use crate::alerts::AlertService;
use crate::config::{SchedulerConfig, ScraperConfig};
use crate::coordinator::ScrapeCoordinator;
use crate::models::{NewProduct, PriceReading, ScrapeFrequency, TrackedProduct};
use crate::scheduler::{BatchResult, BatchScheduler, ScrapeOutcome};
use crate::store::Store;
use crate::utils::error::{AppError, Result};

/// Request to start tracking a product.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(custom(function = "validate_http_url"))]
    pub url: String,
    #[validate(custom(function = "validate_positive_price"))]
    pub target_price: Option<Decimal>,
    pub scrape_frequency: Option<ScrapeFrequency>,
    #[validate(email)]
    pub alert_email: Option<String>,
}

fn validate_http_url(url: &str) -> std::result::Result<(), ValidationError> {
    let parsed = Url::parse(url).map_err(|_| ValidationError::new("invalid_url"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ValidationError::new("url_scheme"));
    }
    Ok(())
}

fn validate_positive_price(price: &Decimal) -> std::result::Result<(), ValidationError> {
    if *price <= Decimal::ZERO {
        return Err(ValidationError::new("non_positive_price"));
    }
    Ok(())
}

/// Price analytics for one product over a window of days, plus all-time
/// aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct PriceAnalytics {
    pub product_id: i64,
    pub product_name: String,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub avg_price: Option<Decimal>,
    pub current_price: Option<Decimal>,
    pub price_change: Option<Decimal>,
    pub percentage_change: Option<f64>,
    pub record_count: i64,
    pub days_analyzed: i64,
    pub is_at_lowest_price: bool,
    pub savings_from_max: Option<Decimal>,
}

/// The service layer tying store, coordinator, batch scheduler and alerts
/// together: everything a scrape cycle or an API call needs.
pub struct ProductTracker {
    store: Arc<Store>,
    coordinator: Arc<ScrapeCoordinator>,
    batch: BatchScheduler,
    alerts: AlertService,
}

impl ProductTracker {
    pub fn new(
        store: Arc<Store>,
        coordinator: Arc<ScrapeCoordinator>,
        alerts: AlertService,
        scraper_config: &ScraperConfig,
        scheduler_config: &SchedulerConfig,
    ) -> Self {
        let batch = BatchScheduler::new(
            Arc::clone(&coordinator),
            scraper_config.max_concurrent_scrapes,
            Duration::from_secs(scheduler_config.job_timeout_secs),
        );
        Self {
            store,
            coordinator,
            batch,
            alerts,
        }
    }

    /// Scrape the URL once, then start tracking it. The initial reading
    /// seeds the price history and can already satisfy the target price.
    pub async fn add_product(&self, request: ProductRequest) -> Result<TrackedProduct> {
        request.validate()?;
        let url = request.url.trim().to_string();

        if self.store.exists_by_url(&url).await? {
            return Err(AppError::DuplicateProduct { url });
        }

        let reading = self.coordinator.scrape_one(&url).await?;
        let site = self
            .coordinator
            .registry()
            .site_name_for(&url)
            .unwrap_or("Unknown");

        let product = self
            .store
            .insert_product(&NewProduct {
                name: reading.product_name.clone(),
                source_site: site.to_string(),
                product_url: url,
                scrape_frequency: request.scrape_frequency.unwrap_or(ScrapeFrequency::Daily),
                target_price: request.target_price,
                alert_email: request.alert_email.clone(),
            })
            .await?;
        info!("Added new product: {} ({})", product.name, product.source_site);

        self.store.record_reading(product.id, &reading).await?;
        self.alerts.process_reading(&product, reading.price, None).await?;

        self.require_product(product.id).await
    }

    /// Manual scrape-now. Typed scrape errors surface directly so the caller
    /// can distinguish "unsupported" from "temporarily unavailable".
    pub async fn refresh_product(&self, id: i64) -> Result<TrackedProduct> {
        let product = self.require_product(id).await?;
        let previous = product.current_price;

        let reading = self.coordinator.scrape_one(&product.product_url).await?;
        self.store.record_reading(id, &reading).await?;
        self.alerts
            .process_reading(&product, reading.price, previous)
            .await?;

        info!(
            "Updated price for {}: {:?} -> {}",
            product.name, previous, reading.price
        );
        self.require_product(id).await
    }

    /// One scheduled cycle for a frequency set: fan out scrapes, then
    /// persist readings and evaluate alerts for the successes. A failed
    /// persist is that item's problem only.
    pub async fn run_due(&self, frequency: ScrapeFrequency) -> Result<BatchResult> {
        let products = self.store.list_active_by_frequency(frequency).await?;
        if products.is_empty() {
            return Ok(BatchResult::default());
        }

        info!("Scraping {} {} products", products.len(), frequency.as_str());
        let result = self.batch.run_batch(&products).await;

        for product in &products {
            if let Some(ScrapeOutcome::Success(reading)) = result.outcome_for(product.id) {
                if let Err(err) = self.persist_success(product, reading).await {
                    error!(
                        "Failed to persist reading for product {} ({}): {}",
                        product.name, product.id, err
                    );
                }
            }
        }

        Ok(result)
    }

    async fn persist_success(
        &self,
        product: &TrackedProduct,
        reading: &PriceReading,
    ) -> Result<()> {
        let previous = product.current_price;
        self.store.record_reading(product.id, reading).await?;
        self.alerts
            .process_reading(product, reading.price, previous)
            .await?;
        Ok(())
    }

    pub async fn analytics(&self, product_id: i64, days: i64) -> Result<PriceAnalytics> {
        let product = self.require_product(product_id).await?;
        let history = self.store.price_history(product_id, days).await?;

        if history.is_empty() {
            return Ok(PriceAnalytics {
                product_id,
                product_name: product.name,
                min_price: None,
                max_price: None,
                avg_price: None,
                current_price: product.current_price,
                price_change: None,
                percentage_change: None,
                record_count: 0,
                days_analyzed: days,
                is_at_lowest_price: false,
                savings_from_max: None,
            });
        }

        let stats = self.store.price_stats(product_id).await?;
        let current = history.last().map(|r| r.price).unwrap_or(Decimal::ZERO);
        let first = history.first().map(|r| r.price).unwrap_or(Decimal::ZERO);
        let price_change = current - first;

        let percentage_change = if first > Decimal::ZERO {
            (price_change / first * Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
                .to_f64()
        } else {
            None
        };

        let (min_price, max_price, avg_price, record_count) = match &stats {
            Some(s) => (Some(s.min), Some(s.max), Some(s.avg), s.count),
            None => (None, None, None, 0),
        };

        Ok(PriceAnalytics {
            product_id,
            product_name: product.name,
            min_price,
            max_price,
            avg_price,
            current_price: Some(current),
            price_change: Some(price_change),
            percentage_change,
            record_count,
            days_analyzed: days,
            is_at_lowest_price: min_price.map_or(false, |min| current <= min),
            savings_from_max: max_price.map(|max| max - current),
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn registry(&self) -> &crate::sites::ScraperRegistry {
        self.coordinator.registry()
    }

    async fn require_product(&self, id: i64) -> Result<TrackedProduct> {
        self.store
            .get_product(id)
            .await?
            .ok_or(AppError::ProductNotFound { id })
    }
}
