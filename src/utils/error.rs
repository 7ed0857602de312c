use serde::Serialize;
use thiserror::Error;

use crate::fetch::FetchError;

/// Top-level application error. Scrape-pipeline failures keep their own
/// typed enum ([`ScrapeError`]) so callers can distinguish the recoverable
/// kinds; everything else converges here.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error("Product not found: {id}")]
    ProductNotFound { id: i64 },

    #[error("Product already tracked for URL: {url}")]
    DuplicateProduct { url: String },

    #[error("Email build error: {0}")]
    Email(#[from] lettre::error::Error),

    #[error("Email address error: {0}")]
    EmailAddress(#[from] lettre::address::AddressError),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

/// Failure of a single scrape attempt. Every variant carries the offending
/// URL so batch summaries and API responses can name the item that failed.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("no scraper available for URL: {url}")]
    UnsupportedSite { url: String },

    #[error("failed to fetch {url}")]
    FetchFailed {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("could not extract a price from {url}")]
    PriceNotFound { url: String },
}

impl ScrapeError {
    pub fn url(&self) -> &str {
        match self {
            ScrapeError::UnsupportedSite { url }
            | ScrapeError::FetchFailed { url, .. }
            | ScrapeError::PriceNotFound { url } => url,
        }
    }

    pub fn kind(&self) -> ScrapeErrorKind {
        match self {
            ScrapeError::UnsupportedSite { .. } => ScrapeErrorKind::UnsupportedSite,
            ScrapeError::FetchFailed { .. } => ScrapeErrorKind::FetchFailed,
            ScrapeError::PriceNotFound { .. } => ScrapeErrorKind::PriceNotFound,
        }
    }
}

/// Discriminant of [`ScrapeError`], used in batch outcomes where the error
/// itself has already been rendered to a detail string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScrapeErrorKind {
    UnsupportedSite,
    FetchFailed,
    PriceNotFound,
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_error_carries_url() {
        let err = ScrapeError::PriceNotFound {
            url: "https://www.amazon.in/dp/B0TEST".to_string(),
        };
        assert_eq!(err.url(), "https://www.amazon.in/dp/B0TEST");
        assert_eq!(err.kind(), ScrapeErrorKind::PriceNotFound);
    }

    #[test]
    fn test_unsupported_site_message() {
        let err = ScrapeError::UnsupportedSite {
            url: "https://unknown-store.example/item".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no scraper available for URL: https://unknown-store.example/item"
        );
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
    }

    #[test]
    fn test_scrape_error_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&ScrapeErrorKind::FetchFailed).unwrap();
        assert_eq!(json, "\"FETCH_FAILED\"");
    }
}
