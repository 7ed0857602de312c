use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::ScrapeFrequency;

/// A product being tracked for price changes. The core treats this as an
/// immutable snapshot per scrape cycle; the store owns the durable row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedProduct {
    pub id: i64,
    pub name: String,
    pub source_site: String,
    pub product_url: String,
    pub scrape_frequency: ScrapeFrequency,
    pub target_price: Option<Decimal>,
    pub current_price: Option<Decimal>,
    pub alert_email: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a product row. Name and source site come from the
/// initial scrape, the rest from the user's request.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub source_site: String,
    pub product_url: String,
    pub scrape_frequency: ScrapeFrequency,
    pub target_price: Option<Decimal>,
    pub alert_email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_product_serialization_roundtrip() {
        let now = Utc::now();
        let product = TrackedProduct {
            id: 7,
            name: "Noise-Cancelling Headphones".to_string(),
            source_site: "Amazon".to_string(),
            product_url: "https://www.amazon.in/dp/B0TEST".to_string(),
            scrape_frequency: ScrapeFrequency::Daily,
            target_price: Some(Decimal::from_str("4999.00").unwrap()),
            current_price: Some(Decimal::from_str("5499.00").unwrap()),
            alert_email: Some("buyer@example.com".to_string()),
            active: true,
            created_at: now,
            updated_at: now,
        };

        let serialized = serde_json::to_string(&product).unwrap();
        let deserialized: TrackedProduct = serde_json::from_str(&serialized).unwrap();
        assert_eq!(product, deserialized);
    }
}
