use rust_decimal::Decimal;
use scraper::{Html, Selector};
use tracing::debug;

use crate::models::{Availability, PriceReading};
use crate::parser::PriceParser;
use crate::sites::{element_text, first_text, parse_selector, PriceSelector, SiteScraper};
use crate::utils::error::ScrapeError;

/// Scraper for Flipkart.com, including fkrt.it short links. Single-locale
/// site, prices are always INR.
pub struct FlipkartScraper {
    parser: PriceParser,
    title_candidates: Vec<Selector>,
    page_title: Selector,
    price_candidates: Vec<PriceSelector>,
    notify_button: Selector,
    buy_button: Selector,
    add_to_cart: Selector,
}

impl FlipkartScraper {
    pub fn new() -> Self {
        let title_candidates = vec![
            parse_selector("span.B_NuCI"),
            parse_selector("h1.yhB1nd"),
            parse_selector(".G6XhRU"),
            parse_selector("h1._9E25nV"),
            parse_selector("span._35KyD6"),
        ];

        // Flipkart's obfuscated class names rotate; the schema.org meta tag
        // is the last-ditch fallback and is read from its content attribute.
        let price_candidates = vec![
            PriceSelector::text("div._30jeq3._16Jk6d"),
            PriceSelector::text("div._30jeq3"),
            PriceSelector::text("div._16Jk6d"),
            PriceSelector::text("span._2I-_Kd._30jeq3"),
            PriceSelector::text("div[class*='_30jeq3']"),
            PriceSelector::attribute("meta[itemprop='price']", "content"),
        ];

        Self {
            parser: PriceParser::new(),
            title_candidates,
            page_title: parse_selector("title"),
            price_candidates,
            notify_button: parse_selector("button._2KpZ6l._2ObVJD"),
            buy_button: parse_selector("button._2KpZ6l._2U9uOA._3v1-ww"),
            add_to_cart: parse_selector("button._2KpZ6l._2U9uOA.ihZ75k._3AWRsL"),
        }
    }

    fn extract_title(&self, doc: &Html) -> String {
        for selector in &self.title_candidates {
            if let Some(title) = first_text(doc, selector) {
                if !title.is_empty() {
                    return title;
                }
            }
        }

        // Fall back to the page title, dropping the ": Buy ... - Flipkart.com"
        // tail
        if let Some(text) = first_text(doc, &self.page_title) {
            if let Some(colon) = text.find(':').filter(|&i| i > 0) {
                return text[..colon].trim().to_string();
            }
            let stripped = text.replace("- Flipkart.com", "");
            let stripped = stripped.trim();
            if !stripped.is_empty() {
                return stripped.to_string();
            }
        }

        "Unknown Product".to_string()
    }

    fn extract_price(&self, doc: &Html) -> Option<Decimal> {
        for candidate in &self.price_candidates {
            if let Some(raw) = candidate.raw_value(doc) {
                match self.parser.parse(&raw) {
                    Ok(price) => return Some(price),
                    Err(err) => debug!("Flipkart price candidate rejected: {}", err),
                }
            }
        }
        None
    }

    fn check_availability(&self, doc: &Html) -> Availability {
        // A "Notify Me" button is the out-of-stock marker
        if let Some(button) = doc.select(&self.notify_button).next() {
            if element_text(&button).to_lowercase().contains("notify") {
                return Availability::Unavailable;
            }
        }

        let purchasable = doc.select(&self.buy_button).next().is_some()
            || doc.select(&self.add_to_cart).next().is_some();
        if purchasable {
            Availability::Available
        } else {
            Availability::Unavailable
        }
    }
}

impl Default for FlipkartScraper {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteScraper for FlipkartScraper {
    fn supports(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        url.contains("flipkart.com") || url.contains("fkrt.it")
    }

    fn site_name(&self) -> &'static str {
        "Flipkart"
    }

    fn extract(&self, doc: &Html, url: &str) -> Result<PriceReading, ScrapeError> {
        let title = self.extract_title(doc);

        let price = self
            .extract_price(doc)
            .ok_or_else(|| ScrapeError::PriceNotFound {
                url: url.to_string(),
            })?;

        let availability = self.check_availability(doc);

        Ok(PriceReading::new(title, price, availability, "INR"))
    }
}
