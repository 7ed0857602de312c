use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::models::{AlertRecord, PriceRecord, TrackedProduct};
use crate::tracker::{PriceAnalytics, ProductRequest};
use crate::utils::error::Result;
use crate::web::AppState;

/// Product row plus its all-time price aggregates, the shape list/detail
/// endpoints return.
#[derive(Debug, Serialize)]
pub struct ProductSummary {
    #[serde(flatten)]
    pub product: TrackedProduct,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub avg_price: Option<Decimal>,
    pub price_record_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct DaysParam {
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CheckUrlParams {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct TargetPriceUpdate {
    pub target_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ActiveUpdate {
    pub active: bool,
}

async fn summarize(state: &AppState, product: TrackedProduct) -> Result<ProductSummary> {
    let stats = state.store.price_stats(product.id).await?;
    let (min_price, max_price, avg_price, price_record_count) = match stats {
        Some(s) => (Some(s.min), Some(s.max), Some(s.avg), s.count),
        None => (None, None, None, 0),
    };
    Ok(ProductSummary {
        product,
        min_price,
        max_price,
        avg_price,
        price_record_count,
    })
}

// --- products ---

pub async fn add_product(
    State(state): State<AppState>,
    Json(request): Json<ProductRequest>,
) -> Result<(StatusCode, Json<TrackedProduct>)> {
    info!("Adding new product: {}", request.url);
    let product = state.tracker.add_product(request).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductSummary>>> {
    let mut summaries = Vec::new();
    for product in state.store.list_products().await? {
        summaries.push(summarize(&state, product).await?);
    }
    Ok(Json(summaries))
}

pub async fn active_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<TrackedProduct>>> {
    Ok(Json(state.store.list_active().await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ProductSummary>> {
    let product = state
        .store
        .get_product(id)
        .await?
        .ok_or(crate::utils::error::AppError::ProductNotFound { id })?;
    Ok(Json(summarize(&state, product).await?))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    if !state.store.delete_product(id).await? {
        return Err(crate::utils::error::AppError::ProductNotFound { id });
    }
    info!("Deleted product {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_target_price(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<TargetPriceUpdate>,
) -> Result<Json<TrackedProduct>> {
    let product = state
        .store
        .get_product(id)
        .await?
        .ok_or(crate::utils::error::AppError::ProductNotFound { id })?;
    state.store.update_target_price(product.id, body.target_price).await?;
    let updated = state
        .store
        .get_product(id)
        .await?
        .ok_or(crate::utils::error::AppError::ProductNotFound { id })?;
    Ok(Json(updated))
}

pub async fn update_active_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ActiveUpdate>,
) -> Result<Json<TrackedProduct>> {
    let product = state
        .store
        .get_product(id)
        .await?
        .ok_or(crate::utils::error::AppError::ProductNotFound { id })?;
    state.store.set_active(product.id, body.active).await?;
    let updated = state
        .store
        .get_product(id)
        .await?
        .ok_or(crate::utils::error::AppError::ProductNotFound { id })?;
    Ok(Json(updated))
}

pub async fn scrape_now(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TrackedProduct>> {
    info!("Manual scrape triggered for product {}", id);
    Ok(Json(state.tracker.refresh_product(id).await?))
}

// --- price history & analytics ---

pub async fn price_history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<DaysParam>,
) -> Result<Json<Vec<PriceRecord>>> {
    let days = params.days.unwrap_or(30);
    Ok(Json(state.store.price_history(id, days).await?))
}

pub async fn all_price_history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<PriceRecord>>> {
    Ok(Json(state.store.all_price_history(id).await?))
}

pub async fn analytics(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<DaysParam>,
) -> Result<Json<PriceAnalytics>> {
    let days = params.days.unwrap_or(30);
    Ok(Json(state.tracker.analytics(id, days).await?))
}

// --- site support introspection ---

pub async fn supported_sites(State(state): State<AppState>) -> Json<Vec<&'static str>> {
    Json(state.registry.supported_sites())
}

pub async fn check_url(
    State(state): State<AppState>,
    Query(params): Query<CheckUrlParams>,
) -> Json<Value> {
    let supported = state.registry.is_supported(&params.url);
    let site = state.registry.site_name_for(&params.url).unwrap_or("Unknown");
    Json(json!({
        "url": params.url,
        "supported": supported,
        "site": site,
    }))
}

// --- alerts ---

pub async fn alerts_for_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<AlertRecord>>> {
    Ok(Json(state.store.alerts_for_product(id).await?))
}

pub async fn pending_alerts(State(state): State<AppState>) -> Result<Json<Vec<AlertRecord>>> {
    Ok(Json(state.store.unnotified_alerts().await?))
}
