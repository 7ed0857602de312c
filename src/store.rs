use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;

use crate::alerts::AlertTrigger;
use crate::models::{
    AlertKind, AlertRecord, Availability, NewProduct, PriceReading, PriceRecord, ScrapeFrequency,
    TrackedProduct,
};
use crate::config::DatabaseConfig;
use crate::utils::error::Result;

/// SQLite-backed persistence for products, price history and alerts.
/// Monetary values are stored as TEXT and mapped to `Decimal` by hand;
/// sqlite has no decimal type and REAL would lose monetary precision.
pub struct Store {
    pool: SqlitePool,
}

/// All-time aggregates over a product's price history.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceStats {
    pub min: Decimal,
    pub max: Decimal,
    pub avg: Decimal,
    pub count: i64,
}

impl Store {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        // sqlite creates the file but not its parent directory
        if let Some(path) = config.url.strip_prefix("sqlite://") {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        info!("Database ready at {}", config.url);
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                source_site TEXT NOT NULL,
                product_url TEXT NOT NULL UNIQUE,
                scrape_frequency TEXT NOT NULL DEFAULT 'DAILY',
                target_price TEXT,
                current_price TEXT,
                alert_email TEXT,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
                price TEXT NOT NULL,
                available INTEGER,
                currency TEXT NOT NULL,
                scraped_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_price_history_product_scraped \
             ON price_history(product_id, scraped_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
                alert_type TEXT NOT NULL,
                trigger_price TEXT NOT NULL,
                previous_price TEXT,
                percentage_change REAL,
                email TEXT NOT NULL,
                notified INTEGER NOT NULL DEFAULT 0,
                triggered_at TEXT NOT NULL,
                notified_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // --- products ---

    pub async fn insert_product(&self, new: &NewProduct) -> Result<TrackedProduct> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO products
                (name, source_site, product_url, scrape_frequency, target_price,
                 alert_email, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(&new.name)
        .bind(&new.source_site)
        .bind(&new.product_url)
        .bind(new.scrape_frequency.as_str())
        .bind(new.target_price.map(|p| p.to_string()))
        .bind(&new.alert_email)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get_product(id)
            .await?
            .ok_or_else(|| crate::utils::error::AppError::Internal(
                format!("product {} vanished after insert", id),
            ))
    }

    pub async fn get_product(&self, id: i64) -> Result<Option<TrackedProduct>> {
        let row = sqlx::query("SELECT * FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| product_from_row(&r)).transpose().map_err(Into::into)
    }

    pub async fn list_products(&self) -> Result<Vec<TrackedProduct>> {
        let rows = sqlx::query("SELECT * FROM products ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(product_from_row).collect::<std::result::Result<_, _>>().map_err(Into::into)
    }

    pub async fn list_active(&self) -> Result<Vec<TrackedProduct>> {
        let rows = sqlx::query("SELECT * FROM products WHERE active = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(product_from_row).collect::<std::result::Result<_, _>>().map_err(Into::into)
    }

    pub async fn list_active_by_frequency(
        &self,
        frequency: ScrapeFrequency,
    ) -> Result<Vec<TrackedProduct>> {
        let rows =
            sqlx::query("SELECT * FROM products WHERE active = 1 AND scrape_frequency = ? ORDER BY id")
                .bind(frequency.as_str())
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(product_from_row).collect::<std::result::Result<_, _>>().map_err(Into::into)
    }

    pub async fn exists_by_url(&self, url: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM products WHERE product_url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn update_target_price(&self, id: i64, target: Option<Decimal>) -> Result<()> {
        sqlx::query("UPDATE products SET target_price = ?, updated_at = ? WHERE id = ?")
            .bind(target.map(|t| t.to_string()))
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_active(&self, id: i64, active: bool) -> Result<()> {
        sqlx::query("UPDATE products SET active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_product(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- price history ---

    /// Append a history row and refresh the product's current price, the two
    /// writes every successful scrape produces.
    pub async fn record_reading(&self, product_id: i64, reading: &PriceReading) -> Result<PriceRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO price_history (product_id, price, available, currency, scraped_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(product_id)
        .bind(reading.price.to_string())
        .bind(reading.availability.as_db())
        .bind(&reading.currency)
        .bind(reading.scraped_at)
        .execute(&self.pool)
        .await?;
        let record_id = result.last_insert_rowid();

        sqlx::query("UPDATE products SET current_price = ?, updated_at = ? WHERE id = ?")
            .bind(reading.price.to_string())
            .bind(Utc::now())
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        Ok(PriceRecord {
            id: record_id,
            product_id,
            price: reading.price,
            availability: reading.availability,
            currency: reading.currency.clone(),
            scraped_at: reading.scraped_at,
        })
    }

    /// History within the last `days`, oldest first.
    pub async fn price_history(&self, product_id: i64, days: i64) -> Result<Vec<PriceRecord>> {
        let since = Utc::now() - Duration::days(days);
        let rows = sqlx::query(
            "SELECT * FROM price_history WHERE product_id = ? AND scraped_at >= ? \
             ORDER BY scraped_at ASC",
        )
        .bind(product_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(record_from_row).collect::<std::result::Result<_, _>>().map_err(Into::into)
    }

    /// Complete history, most recent first.
    pub async fn all_price_history(&self, product_id: i64) -> Result<Vec<PriceRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM price_history WHERE product_id = ? ORDER BY scraped_at DESC",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(record_from_row).collect::<std::result::Result<_, _>>().map_err(Into::into)
    }

    pub async fn latest_price(&self, product_id: i64) -> Result<Option<PriceRecord>> {
        let row = sqlx::query(
            "SELECT * FROM price_history WHERE product_id = ? ORDER BY scraped_at DESC LIMIT 1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| record_from_row(&r)).transpose().map_err(Into::into)
    }

    /// All-time min/max/avg/count, computed over the decoded decimals so TEXT
    /// storage never degrades to lexicographic comparison.
    pub async fn price_stats(&self, product_id: i64) -> Result<Option<PriceStats>> {
        let rows = sqlx::query("SELECT price FROM price_history WHERE product_id = ?")
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        let mut prices = Vec::with_capacity(rows.len());
        for row in &rows {
            prices.push(decode_decimal(row, "price")?);
        }

        let Some(first) = prices.first().copied() else {
            return Ok(None);
        };

        let (mut min, mut max) = (first, first);
        let mut sum = Decimal::ZERO;
        for price in &prices {
            min = min.min(*price);
            max = max.max(*price);
            sum += *price;
        }
        let count = prices.len() as i64;
        let avg = (sum / Decimal::from(count)).round_dp(2);

        Ok(Some(PriceStats { min, max, avg, count }))
    }

    // --- alerts ---

    pub async fn insert_alert(
        &self,
        product_id: i64,
        trigger: &AlertTrigger,
        email: &str,
    ) -> Result<AlertRecord> {
        let triggered_at = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO alerts
                (product_id, alert_type, trigger_price, previous_price,
                 percentage_change, email, notified, triggered_at)
            VALUES (?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(product_id)
        .bind(trigger.kind.as_str())
        .bind(trigger.trigger_price.to_string())
        .bind(trigger.previous_price.map(|p| p.to_string()))
        .bind(trigger.percentage_change)
        .bind(email)
        .bind(triggered_at)
        .execute(&self.pool)
        .await?;

        Ok(AlertRecord {
            id: result.last_insert_rowid(),
            product_id,
            kind: trigger.kind,
            trigger_price: trigger.trigger_price,
            previous_price: trigger.previous_price,
            percentage_change: trigger.percentage_change,
            email: email.to_string(),
            notified: false,
            triggered_at,
            notified_at: None,
        })
    }

    pub async fn mark_alert_notified(&self, alert_id: i64) -> Result<()> {
        sqlx::query("UPDATE alerts SET notified = 1, notified_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(alert_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn alerts_for_product(&self, product_id: i64) -> Result<Vec<AlertRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM alerts WHERE product_id = ? ORDER BY triggered_at DESC",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(alert_from_row).collect::<std::result::Result<_, _>>().map_err(Into::into)
    }

    pub async fn unnotified_alerts(&self) -> Result<Vec<AlertRecord>> {
        let rows = sqlx::query("SELECT * FROM alerts WHERE notified = 0 ORDER BY triggered_at")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(alert_from_row).collect::<std::result::Result<_, _>>().map_err(Into::into)
    }
}

fn decode_decimal(row: &SqliteRow, column: &str) -> std::result::Result<Decimal, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn decode_optional_decimal(
    row: &SqliteRow,
    column: &str,
) -> std::result::Result<Option<Decimal>, sqlx::Error> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| {
        Decimal::from_str(&s).map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
    })
    .transpose()
}

fn product_from_row(row: &SqliteRow) -> std::result::Result<TrackedProduct, sqlx::Error> {
    let frequency: String = row.try_get("scrape_frequency")?;
    Ok(TrackedProduct {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        source_site: row.try_get("source_site")?,
        product_url: row.try_get("product_url")?,
        scrape_frequency: ScrapeFrequency::from_str(&frequency).map_err(|e| {
            sqlx::Error::ColumnDecode {
                index: "scrape_frequency".to_string(),
                source: Box::new(e),
            }
        })?,
        target_price: decode_optional_decimal(row, "target_price")?,
        current_price: decode_optional_decimal(row, "current_price")?,
        alert_email: row.try_get("alert_email")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn record_from_row(row: &SqliteRow) -> std::result::Result<PriceRecord, sqlx::Error> {
    Ok(PriceRecord {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        price: decode_decimal(row, "price")?,
        availability: Availability::from_db(row.try_get("available")?),
        currency: row.try_get("currency")?,
        scraped_at: row.try_get("scraped_at")?,
    })
}

fn alert_from_row(row: &SqliteRow) -> std::result::Result<AlertRecord, sqlx::Error> {
    let kind: String = row.try_get("alert_type")?;
    Ok(AlertRecord {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        kind: AlertKind::from_str(&kind).map_err(|e| sqlx::Error::ColumnDecode {
            index: "alert_type".to_string(),
            source: Box::new(e),
        })?,
        trigger_price: decode_decimal(row, "trigger_price")?,
        previous_price: decode_optional_decimal(row, "previous_price")?,
        percentage_change: row.try_get("percentage_change")?,
        email: row.try_get("email")?,
        notified: row.try_get("notified")?,
        triggered_at: row.try_get("triggered_at")?,
        notified_at: row.try_get("notified_at")?,
    })
}
