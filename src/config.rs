use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub scraper: ScraperConfig,
    pub scheduler: SchedulerConfig,
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub max_concurrent_scrapes: usize,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Six-field cron (with seconds) for the hourly set.
    pub hourly_cron: String,
    /// Six-field cron (with seconds) for the daily set.
    pub daily_cron: String,
    /// Upper bound on one item's scrape, fetch included.
    pub job_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: String,
    pub use_tls: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/pricepulse.db".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 30,
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_concurrent_scrapes: 8,
            request_timeout_secs: 15,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            hourly_cron: "0 0 * * * *".to_string(),
            daily_cron: "0 0 6 * * *".to_string(),
            job_timeout_secs: 60,
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            username: None,
            password: None,
            from_address: "pricepulse@example.com".to_string(),
            from_name: "PricePulse".to_string(),
            use_tls: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            scraper: ScraperConfig::default(),
            scheduler: SchedulerConfig::default(),
            email: EmailConfig::default(),
        }
    }
}

impl AppConfig {
    /// Layered load: default file, RUN_MODE-specific file, git-ignored local
    /// file, then `PRICEPULSE__`-prefixed environment variables.
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let settings = Config::builder()
            .add_source(File::with_name(&format!("{}/default", config_dir)))
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            .add_source(File::with_name(&format!("{}/local", config_dir)).required(false))
            .add_source(Environment::with_prefix("PRICEPULSE").separator("__"))
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message(
                "Server port must be greater than 0".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max_connections must be greater than 0".into(),
            ));
        }

        if self.scraper.max_concurrent_scrapes == 0 {
            return Err(ConfigError::Message(
                "Scraper max_concurrent_scrapes must be greater than 0".into(),
            ));
        }

        if !(1..=120).contains(&self.scraper.request_timeout_secs) {
            return Err(ConfigError::Message(
                "Scraper request_timeout_secs must be between 1 and 120".into(),
            ));
        }

        if !is_valid_cron(&self.scheduler.hourly_cron) || !is_valid_cron(&self.scheduler.daily_cron)
        {
            return Err(ConfigError::Message(
                "Invalid cron expression in scheduler configuration".into(),
            ));
        }

        if self.scheduler.job_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Scheduler job_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.email.smtp_port == 0 {
            return Err(ConfigError::Message(
                "SMTP port must be greater than 0".into(),
            ));
        }

        if self.email.enabled && self.email.from_address.is_empty() {
            return Err(ConfigError::Message(
                "Email from_address is required when email is enabled".into(),
            ));
        }

        Ok(())
    }
}

/// Basic validation of a six- or seven-field cron expression (seconds-first,
/// as tokio-cron-scheduler expects).
fn is_valid_cron(expression: &str) -> bool {
    let parts: Vec<&str> = expression.split_whitespace().collect();
    if !(parts.len() == 6 || parts.len() == 7) {
        return false;
    }

    parts.iter().all(|part| {
        !part.is_empty()
            && part
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '*' | '-' | ',' | '/'))
    })
}
