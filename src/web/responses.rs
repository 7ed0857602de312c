use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, warn};

use crate::utils::error::{AppError, ScrapeError};

/// Standardized JSON error body for every API failure.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub error: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, error: &str, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            error: error.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, title, message) = match &self {
            AppError::ProductNotFound { .. } => {
                warn!("Product not found: {}", self);
                (StatusCode::NOT_FOUND, "Product Not Found", self.to_string())
            }
            AppError::DuplicateProduct { .. } => {
                warn!("Duplicate product: {}", self);
                (StatusCode::CONFLICT, "Product Already Exists", self.to_string())
            }
            AppError::Validation(message) => {
                warn!("Validation failed: {}", message);
                (StatusCode::BAD_REQUEST, "Validation Failed", message.clone())
            }
            AppError::Scrape(ScrapeError::UnsupportedSite { .. }) => {
                warn!("Unsupported site: {}", self);
                (
                    StatusCode::BAD_REQUEST,
                    "Unsupported Website",
                    self.to_string(),
                )
            }
            AppError::Scrape(err) => {
                error!("Scraping failed for URL {}: {}", err.url(), err);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Scraping Failed",
                    "Could not fetch product data. The website may be temporarily \
                     unavailable. Please try again later."
                        .to_string(),
                )
            }
            _ => {
                error!("Unexpected error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    "An unexpected error occurred. Please try again later.".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse::new(status, title, message))).into_response()
    }
}
