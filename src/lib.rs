pub mod alerts;
pub mod config;
pub mod coordinator;
pub mod fetch;
pub mod models;
pub mod notifier;
pub mod parser;
pub mod scheduler;
pub mod sites;
pub mod store;
pub mod tracker;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use coordinator::ScrapeCoordinator;
pub use sites::ScraperRegistry;
pub use tracker::{ProductRequest, ProductTracker};
pub use utils::error::{AppError, ScrapeError, ScrapeErrorKind};

pub type Result<T> = std::result::Result<T, AppError>;
