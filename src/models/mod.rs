use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod alert;
pub mod price_history;
pub mod product;
pub mod reading;

// Re-exports for convenience
pub use alert::*;
pub use price_history::*;
pub use product::*;
pub use reading::*;

/// How often a tracked product is re-scraped. Stored as TEXT, exposed on the
/// wire as `HOURLY` / `DAILY` (the values the API accepts).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScrapeFrequency {
    Hourly,
    Daily,
}

impl ScrapeFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeFrequency::Hourly => "HOURLY",
            ScrapeFrequency::Daily => "DAILY",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown scrape frequency: {0}")]
pub struct ParseFrequencyError(String);

impl std::str::FromStr for ScrapeFrequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HOURLY" => Ok(ScrapeFrequency::Hourly),
            "DAILY" => Ok(ScrapeFrequency::Daily),
            other => Err(ParseFrequencyError(other.to_string())),
        }
    }
}

/// Kind of a triggered alert. Stored as TEXT in the alerts table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    TargetReached,
    PriceDrop,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::TargetReached => "TARGET_REACHED",
            AlertKind::PriceDrop => "PRICE_DROP",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown alert kind: {0}")]
pub struct ParseAlertKindError(String);

impl std::str::FromStr for AlertKind {
    type Err = ParseAlertKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TARGET_REACHED" => Ok(AlertKind::TargetReached),
            "PRICE_DROP" => Ok(AlertKind::PriceDrop),
            other => Err(ParseAlertKindError(other.to_string())),
        }
    }
}

/// Stock state read off a product page. Sites resolve to a definite
/// available/unavailable; `Unknown` only appears for historical rows whose
/// source never recorded a signal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Unavailable,
    Unknown,
}

impl Availability {
    pub fn from_db(value: Option<bool>) -> Self {
        match value {
            Some(true) => Availability::Available,
            Some(false) => Availability::Unavailable,
            None => Availability::Unknown,
        }
    }

    pub fn as_db(&self) -> Option<bool> {
        match self {
            Availability::Available => Some(true),
            Availability::Unavailable => Some(false),
            Availability::Unknown => None,
        }
    }
}
