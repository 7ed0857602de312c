use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::AlertKind;

/// A triggered alert with its notification bookkeeping. `notified` flips to
/// true only after the email actually went out, so delivery is at-most-once
/// across process restarts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertRecord {
    pub id: i64,
    pub product_id: i64,
    pub kind: AlertKind,
    pub trigger_price: Decimal,
    pub previous_price: Option<Decimal>,
    pub percentage_change: Option<f64>,
    pub email: String,
    pub notified: bool,
    pub triggered_at: DateTime<Utc>,
    pub notified_at: Option<DateTime<Utc>>,
}
