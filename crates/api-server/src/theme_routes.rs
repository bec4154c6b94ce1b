//! Theme API Routes
//!
//! Read-only views of the published theme set for the dashboard.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use theme_core::{MarketStatus, StockSnapshot, Theme, ThemeTaxonomy};

use crate::{ApiResponse, AppError, AppState};

const DEFAULT_HOT_STOCKS: usize = 30;

/// Published shape consumed by the dashboard
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemesResponse {
    pub themes: Vec<Theme>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
    pub version: u64,
    pub market_status: MarketStatus,
}

#[derive(Deserialize)]
pub struct HotStocksQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
    pub theme_count: usize,
    pub market_status: MarketStatus,
}

pub fn theme_routes() -> Router<AppState> {
    Router::new()
        .route("/api/themes", get(get_themes))
        .route("/api/themes/:id", get(get_theme))
        .route("/api/hot-stocks", get(get_hot_stocks))
        .route("/api/theme-sectors", get(get_theme_sectors))
        .route("/api/health", get(health))
}

/// Not wrapped in `ApiResponse`; the dashboard reads these keys at the top level.
async fn get_themes(State(state): State<AppState>) -> Json<ThemesResponse> {
    let current = state.store.current();
    Json(ThemesResponse {
        themes: current.themes.clone(),
        last_updated: current.last_updated,
        version: current.version,
        market_status: current.market_status,
    })
}

async fn get_theme(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Theme>>, AppError> {
    let current = state.store.current();
    let theme = current
        .themes
        .iter()
        .find(|t| t.id == id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Theme {} not found", id)))?;
    Ok(Json(ApiResponse::success(theme)))
}

async fn get_hot_stocks(
    State(state): State<AppState>,
    Query(query): Query<HotStocksQuery>,
) -> Result<Json<ApiResponse<Vec<StockSnapshot>>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_HOT_STOCKS);
    if limit == 0 {
        return Err(AppError::BadRequest("limit must be positive".to_string()));
    }

    let current = state.store.current();
    let stocks = current.hot_stocks.iter().take(limit).cloned().collect();
    Ok(Json(ApiResponse::success(stocks)))
}

async fn get_theme_sectors(State(state): State<AppState>) -> Result<Json<ApiResponse<ThemeTaxonomy>>, AppError> {
    Ok(Json(ApiResponse::success(state.taxonomy.as_ref().clone())))
}

async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let current = state.store.current();
    Json(ApiResponse::success(HealthResponse {
        status: if current.version == 0 { "warming_up" } else { "ok" },
        version: current.version,
        last_updated: current.last_updated,
        theme_count: current.themes.len(),
        market_status: MarketStatus::at(Utc::now()),
    }))
}
