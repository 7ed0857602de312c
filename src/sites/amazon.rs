use rust_decimal::Decimal;
use scraper::{Html, Selector};
use tracing::debug;

use crate::models::{Availability, PriceReading};
use crate::parser::PriceParser;
use crate::sites::{first_text, parse_selector, PriceSelector, SiteScraper};
use crate::utils::error::ScrapeError;

/// Scraper for Amazon India and Amazon.com, including amzn short links.
pub struct AmazonScraper {
    parser: PriceParser,
    product_title: Selector,
    page_title: Selector,
    price_candidates: Vec<PriceSelector>,
    availability: Selector,
    add_to_cart: Selector,
}

impl AmazonScraper {
    pub fn new() -> Self {
        // Amazon changes its price markup frequently; most specific and
        // stable selectors first, generic fallbacks last. Order matters.
        let price_candidates = vec![
            PriceSelector::text(".a-price-whole"),
            PriceSelector::text("#priceblock_ourprice"),
            PriceSelector::text("#priceblock_dealprice"),
            PriceSelector::text(".a-offscreen"),
            PriceSelector::text("span[data-a-color='price'] .a-offscreen"),
            PriceSelector::text("#corePrice_feature_div .a-offscreen"),
            PriceSelector::text(".priceToPay .a-offscreen"),
            PriceSelector::text("#apex_offerDisplay_desktop .a-offscreen"),
        ];

        Self {
            parser: PriceParser::new(),
            product_title: parse_selector("#productTitle"),
            page_title: parse_selector("title"),
            price_candidates,
            availability: parse_selector("#availability"),
            add_to_cart: parse_selector("#add-to-cart-button"),
        }
    }

    fn extract_title(&self, doc: &Html) -> String {
        if let Some(title) = first_text(doc, &self.product_title) {
            if !title.is_empty() {
                return title;
            }
        }

        // Fall back to the page title, dropping the " - Amazon.in" suffix
        if let Some(text) = first_text(doc, &self.page_title) {
            if let Some(dash) = text.rfind('-').filter(|&i| i > 0) {
                return text[..dash].trim().to_string();
            }
            if !text.is_empty() {
                return text;
            }
        }

        "Unknown Product".to_string()
    }

    fn extract_price(&self, doc: &Html) -> Option<Decimal> {
        for candidate in &self.price_candidates {
            if let Some(raw) = candidate.raw_value(doc) {
                match self.parser.parse(&raw) {
                    Ok(price) => return Some(price),
                    Err(err) => debug!("Amazon price candidate rejected: {}", err),
                }
            }
        }
        None
    }

    fn check_availability(&self, doc: &Html) -> Availability {
        if let Some(text) = first_text(doc, &self.availability) {
            let text = text.to_lowercase();
            if text.contains("in stock") {
                return Availability::Available;
            }
            if text.contains("out of stock") || text.contains("unavailable") {
                return Availability::Unavailable;
            }
        }

        // No explicit signal: a present add-to-cart control counts as in
        // stock. Pages can render the control for notify-me states too; if
        // that turns out to matter a negative-signal check goes here.
        if doc.select(&self.add_to_cart).next().is_some() {
            Availability::Available
        } else {
            Availability::Unavailable
        }
    }
}

impl Default for AmazonScraper {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteScraper for AmazonScraper {
    fn supports(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        url.contains("amazon.in")
            || url.contains("amazon.com")
            || url.contains("amzn.in")
            || url.contains("amzn.com")
    }

    fn site_name(&self) -> &'static str {
        "Amazon"
    }

    fn extract(&self, doc: &Html, url: &str) -> Result<PriceReading, ScrapeError> {
        let title = self.extract_title(doc);

        let price = self
            .extract_price(doc)
            .ok_or_else(|| ScrapeError::PriceNotFound {
                url: url.to_string(),
            })?;

        let availability = self.check_availability(doc);

        let lower = url.to_lowercase();
        let currency = if lower.contains("amazon.in") || lower.contains("amzn.in") {
            "INR"
        } else {
            "USD"
        };

        Ok(PriceReading::new(title, price, availability, currency))
    }
}
