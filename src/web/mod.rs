use axum::routing::{get, patch, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::sites::ScraperRegistry;
use crate::store::Store;
use crate::tracker::ProductTracker;

pub mod handlers;
pub mod responses;

pub use handlers::*;
pub use responses::ErrorResponse;

#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<ProductTracker>,
    pub store: Arc<Store>,
    pub registry: Arc<ScraperRegistry>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(add_product))
        .route("/products/active", get(active_products))
        .route("/products/supported-sites", get(supported_sites))
        .route("/products/check-url", get(check_url))
        .route("/products/:id", get(get_product).delete(delete_product))
        .route("/products/:id/prices", get(price_history))
        .route("/products/:id/prices/all", get(all_price_history))
        .route("/products/:id/analytics", get(analytics))
        .route("/products/:id/target-price", patch(update_target_price))
        .route("/products/:id/active", patch(update_active_status))
        .route("/products/:id/scrape", post(scrape_now))
        .route("/alerts/product/:id", get(alerts_for_product))
        .route("/alerts/pending", get(pending_alerts))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": "pricepulse"
    }))
}

pub async fn serve(config: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server listening on {}:{}", config.host, config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertService;
    use crate::config::{DatabaseConfig, EmailConfig, SchedulerConfig, ScraperConfig};
    use crate::coordinator::ScrapeCoordinator;
    use crate::fetch::{FetchError, PageFetcher};
    use crate::notifier::EmailNotifier;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use async_trait::async_trait;
    use tower::ServiceExt;

    struct FixtureFetcher;

    #[async_trait]
    impl PageFetcher for FixtureFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            Ok(r#"<html><body>
                <span id="productTitle">Fixture Product</span>
                <span class="a-price-whole">2,499</span>
                <div id="availability">In stock</div>
            </body></html>"#
                .to_string())
        }
    }

    async fn test_state() -> AppState {
        let store = Arc::new(
            Store::connect(&DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
                acquire_timeout_secs: 5,
            })
            .await
            .unwrap(),
        );
        let registry = Arc::new(ScraperRegistry::with_default_sites());
        let coordinator = Arc::new(ScrapeCoordinator::new(
            Arc::clone(&registry),
            Arc::new(FixtureFetcher),
        ));
        let notifier = Arc::new(EmailNotifier::new(EmailConfig::default()).unwrap());
        let alerts = AlertService::new(Arc::clone(&store), notifier);
        let tracker = Arc::new(ProductTracker::new(
            Arc::clone(&store),
            coordinator,
            alerts,
            &ScraperConfig::default(),
            &SchedulerConfig::default(),
        ));

        AppState {
            tracker,
            store,
            registry,
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_supported_sites_endpoint() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/products/supported-sites")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!(["Amazon", "Flipkart"]));
    }

    #[tokio::test]
    async fn test_check_url_endpoint() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/products/check-url?url=https://www.flipkart.com/p/itm1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["supported"], true);
        assert_eq!(body["site"], "Flipkart");
    }

    #[tokio::test]
    async fn test_create_product_and_fetch_it() {
        let state = test_state().await;
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/products")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"url": "https://www.amazon.in/dp/B0TEST", "target_price": 2000, "scrape_frequency": "HOURLY"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["name"], "Fixture Product");
        assert_eq!(created["source_site"], "Amazon");

        let id = created["id"].as_i64().unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/products/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let fetched = body_json(response).await;
        assert_eq!(fetched["price_record_count"], 1);
    }

    #[tokio::test]
    async fn test_create_product_unsupported_site_is_400() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/products")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"url": "https://unknown-store.example/item"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Unsupported Website");
    }

    #[tokio::test]
    async fn test_missing_product_is_404() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/products/9999")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
