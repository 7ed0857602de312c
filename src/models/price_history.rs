use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Availability;

/// A historical price record for a product, one row per scrape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceRecord {
    pub id: i64,
    pub product_id: i64,
    pub price: Decimal,
    pub availability: Availability,
    pub currency: String,
    pub scraped_at: DateTime<Utc>,
}
