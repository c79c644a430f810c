use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::models::PricePoint;
use crate::services::price_service::{self, RefreshSummary};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/refresh", post(refresh_prices))
        .route("/:symbol", get(fetch_history))
        .route("/:symbol/latest", get(fetch_latest))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub symbols: Vec<String>,
}

#[axum::debug_handler]
pub async fn refresh_prices(
    State(state): State<AppState>,
    Json(data): Json<RefreshRequest>,
) -> Result<Json<RefreshSummary>, AppError> {
    info!("POST /prices/refresh - Refreshing {} symbols", data.symbols.len());
    if data.symbols.is_empty() {
        return Err(AppError::Validation("symbols must not be empty".to_string()));
    }

    let symbols: Vec<String> = data.symbols.iter().map(|s| s.to_uppercase()).collect();
    let summary =
        price_service::refresh_symbols(&state.pool, state.price_provider.as_ref(), &symbols).await;
    Ok(Json(summary))
}

pub async fn fetch_history(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Vec<PricePoint>>, AppError> {
    info!("GET /prices/{} - Fetching price history", symbol);
    let points = price_service::history(&state.pool, &symbol.to_uppercase()).await?;
    Ok(Json(points))
}

pub async fn fetch_latest(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<PricePoint>, AppError> {
    info!("GET /prices/{}/latest - Fetching latest close", symbol);
    let point = price_service::latest(&state.pool, &symbol.to_uppercase()).await?;
    Ok(Json(point))
}
