use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Availability;

/// One normalized observation extracted from a product page. Produced fresh
/// by each scrape; never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceReading {
    pub product_name: String,
    pub price: Decimal,
    pub availability: Availability,
    pub currency: String,
    pub scraped_at: DateTime<Utc>,
}

impl PriceReading {
    pub fn new(
        product_name: impl Into<String>,
        price: Decimal,
        availability: Availability,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            product_name: product_name.into(),
            price,
            availability,
            currency: currency.into(),
            scraped_at: Utc::now(),
        }
    }
}
