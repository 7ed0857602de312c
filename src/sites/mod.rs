use scraper::{Html, Selector};
use tracing::warn;

use crate::models::PriceReading;
use crate::utils::error::ScrapeError;

pub mod amazon;
pub mod flipkart;

pub use amazon::AmazonScraper;
pub use flipkart::FlipkartScraper;

/// Site-specific extraction strategy. One implementation per supported site,
/// registered once at startup.
pub trait SiteScraper: Send + Sync {
    /// Cheap, pure URL match (case-insensitive, including short-link
    /// domains). Used for dispatch before any fetch happens.
    fn supports(&self, url: &str) -> bool;

    /// Stable human-readable label, persisted as the product's source site.
    fn site_name(&self) -> &'static str;

    /// Extract name, price and availability from an already-fetched
    /// document. Selector-level parse failures are recovered internally by
    /// falling through to the next candidate.
    fn extract(&self, doc: &Html, url: &str) -> Result<PriceReading, ScrapeError>;
}

/// Where a price candidate's raw text comes from: element text, or an
/// attribute value (e.g. the `content` of a schema.org price tag).
pub(crate) enum ValueSource {
    Text,
    Attribute(&'static str),
}

/// One entry in a site's ordered price candidate list. The list order
/// encodes a reliability ranking and is part of the site contract.
pub(crate) struct PriceSelector {
    selector: Selector,
    source: ValueSource,
}

impl PriceSelector {
    pub fn text(css: &str) -> Self {
        Self {
            selector: parse_selector(css),
            source: ValueSource::Text,
        }
    }

    pub fn attribute(css: &str, attr: &'static str) -> Self {
        Self {
            selector: parse_selector(css),
            source: ValueSource::Attribute(attr),
        }
    }

    pub fn raw_value(&self, doc: &Html) -> Option<String> {
        let element = doc.select(&self.selector).next()?;
        match self.source {
            ValueSource::Text => Some(element_text(&element)),
            ValueSource::Attribute(name) => element.value().attr(name).map(str::to_string),
        }
    }
}

pub(crate) fn parse_selector(css: &str) -> Selector {
    Selector::parse(css).expect("site selector is valid CSS")
}

pub(crate) fn element_text(element: &scraper::ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

pub(crate) fn first_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector).next().map(|el| element_text(&el))
}

/// Ordered set of registered site scrapers. Dispatch is first-match-wins in
/// registration order, which is fixed and stable across runs.
pub struct ScraperRegistry {
    scrapers: Vec<Box<dyn SiteScraper>>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self {
            scrapers: Vec::new(),
        }
    }

    /// Registry with every shipped site, in the canonical order.
    pub fn with_default_sites() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(AmazonScraper::new()));
        registry.register(Box::new(FlipkartScraper::new()));
        registry
    }

    pub fn register(&mut self, scraper: Box<dyn SiteScraper>) {
        self.scrapers.push(scraper);
    }

    /// First registered scraper whose `supports` matches the URL.
    pub fn dispatch(&self, url: &str) -> Result<&dyn SiteScraper, ScrapeError> {
        self.scrapers
            .iter()
            .find(|scraper| scraper.supports(url))
            .map(|scraper| scraper.as_ref())
            .ok_or_else(|| {
                warn!("No scraper found for URL: {}", url);
                ScrapeError::UnsupportedSite {
                    url: url.to_string(),
                }
            })
    }

    pub fn is_supported(&self, url: &str) -> bool {
        self.scrapers.iter().any(|scraper| scraper.supports(url))
    }

    pub fn site_name_for(&self, url: &str) -> Option<&'static str> {
        self.scrapers
            .iter()
            .find(|scraper| scraper.supports(url))
            .map(|scraper| scraper.site_name())
    }

    pub fn supported_sites(&self) -> Vec<&'static str> {
        self.scrapers.iter().map(|s| s.site_name()).collect()
    }

    pub fn len(&self) -> usize {
        self.scrapers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scrapers.is_empty()
    }
}

impl Default for ScraperRegistry {
    fn default() -> Self {
        Self::with_default_sites()
    }
}
