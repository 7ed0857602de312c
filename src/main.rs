use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use pricepulse::alerts::AlertService;
use pricepulse::config::AppConfig;
use pricepulse::coordinator::ScrapeCoordinator;
use pricepulse::fetch::HttpFetcher;
use pricepulse::notifier::EmailNotifier;
use pricepulse::scheduler;
use pricepulse::sites::ScraperRegistry;
use pricepulse::store::Store;
use pricepulse::tracker::ProductTracker;
use pricepulse::web::{self, AppState};

#[derive(Parser)]
#[command(name = "pricepulse", about = "Price tracking service", version)]
struct Cli {
    /// Directory containing the layered configuration files
    #[arg(long, default_value = "config")]
    config_dir: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pricepulse=debug".parse()?),
        )
        .init();

    info!("Starting PricePulse...");
    let config = AppConfig::load(&cli.config_dir)?;

    let store = Arc::new(Store::connect(&config.database).await?);
    let registry = Arc::new(ScraperRegistry::with_default_sites());
    info!("Registered site scrapers: {:?}", registry.supported_sites());

    let fetcher = Arc::new(HttpFetcher::new(&config.scraper)?);
    let coordinator = Arc::new(ScrapeCoordinator::new(Arc::clone(&registry), fetcher));
    let notifier = Arc::new(EmailNotifier::new(config.email.clone())?);
    let alerts = AlertService::new(Arc::clone(&store), notifier);

    let tracker = Arc::new(ProductTracker::new(
        Arc::clone(&store),
        Arc::clone(&coordinator),
        alerts,
        &config.scraper,
        &config.scheduler,
    ));

    let mut job_scheduler =
        scheduler::start_scheduled_jobs(Arc::clone(&tracker), &config.scheduler).await?;

    let state = AppState {
        tracker,
        store,
        registry,
    };
    web::serve(&config.server, state).await?;

    job_scheduler.shutdown().await?;
    info!("Shutting down...");

    Ok(())
}
