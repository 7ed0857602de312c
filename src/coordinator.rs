use scraper::Html;
use std::sync::Arc;
use tracing::{debug, info};

use crate::fetch::PageFetcher;
use crate::models::PriceReading;
use crate::sites::ScraperRegistry;
use crate::utils::error::ScrapeError;

/// Orchestrates one scrape: dispatch the URL to a site scraper, fetch the
/// page, extract a reading. Performs no retries; a failure is final for the
/// cycle and retry policy belongs to the caller.
pub struct ScrapeCoordinator {
    registry: Arc<ScraperRegistry>,
    fetcher: Arc<dyn PageFetcher>,
}

impl ScrapeCoordinator {
    pub fn new(registry: Arc<ScraperRegistry>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { registry, fetcher }
    }

    pub fn registry(&self) -> &ScraperRegistry {
        &self.registry
    }

    pub async fn scrape_one(&self, url: &str) -> Result<PriceReading, ScrapeError> {
        // Unsupported URLs short-circuit before any fetch is attempted
        let scraper = self.registry.dispatch(url)?;
        debug!("Scraping {} URL: {}", scraper.site_name(), url);

        let body = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|source| ScrapeError::FetchFailed {
                url: url.to_string(),
                source,
            })?;

        let reading = {
            let doc = Html::parse_document(&body);
            scraper.extract(&doc, url)
        }?;

        info!(
            "Successfully scraped: {} - Price: {} {}",
            reading.product_name, reading.price, reading.currency
        );
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchError, MockPageFetcher};
    use crate::models::Availability;
    use reqwest::StatusCode;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const AMAZON_PAGE: &str = r#"
        <html><body>
            <span id="productTitle">Espresso Machine</span>
            <span class="a-price-whole">12,999</span>
            <div id="availability">In stock</div>
        </body></html>
    "#;

    fn coordinator_with(fetcher: MockPageFetcher) -> ScrapeCoordinator {
        ScrapeCoordinator::new(
            Arc::new(ScraperRegistry::with_default_sites()),
            Arc::new(fetcher),
        )
    }

    #[tokio::test]
    async fn test_scrape_one_happy_path() {
        let mut fetcher = MockPageFetcher::new();
        fetcher
            .expect_fetch()
            .returning(|_| Ok(AMAZON_PAGE.to_string()));

        let coordinator = coordinator_with(fetcher);
        let reading = coordinator
            .scrape_one("https://www.amazon.in/dp/B0TEST")
            .await
            .unwrap();

        assert_eq!(reading.product_name, "Espresso Machine");
        assert_eq!(reading.price, Decimal::from_str("12999").unwrap());
        assert_eq!(reading.availability, Availability::Available);
        assert_eq!(reading.currency, "INR");
    }

    #[tokio::test]
    async fn test_unsupported_url_short_circuits_without_fetch() {
        let mut fetcher = MockPageFetcher::new();
        fetcher.expect_fetch().times(0);

        let coordinator = coordinator_with(fetcher);
        let err = coordinator
            .scrape_one("https://unknown-store.example/item")
            .await
            .unwrap_err();

        assert!(matches!(err, ScrapeError::UnsupportedSite { .. }));
    }

    #[tokio::test]
    async fn test_transport_failure_is_wrapped_with_url() {
        let mut fetcher = MockPageFetcher::new();
        fetcher.expect_fetch().returning(|_| {
            Err(FetchError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
            })
        });

        let coordinator = coordinator_with(fetcher);
        let err = coordinator
            .scrape_one("https://www.amazon.com/dp/B0TEST")
            .await
            .unwrap_err();

        assert!(
            matches!(err, ScrapeError::FetchFailed { ref url, .. } if url == "https://www.amazon.com/dp/B0TEST")
        );
    }

    #[tokio::test]
    async fn test_extraction_failure_propagates_unchanged() {
        let mut fetcher = MockPageFetcher::new();
        fetcher
            .expect_fetch()
            .returning(|_| Ok("<html><body>nothing here</body></html>".to_string()));

        let coordinator = coordinator_with(fetcher);
        let err = coordinator
            .scrape_one("https://www.flipkart.com/p/itm0TEST")
            .await
            .unwrap_err();

        assert!(matches!(err, ScrapeError::PriceNotFound { .. }));
    }
}
