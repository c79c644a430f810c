use axum::extract::{Path, State};
use axum::routing::{delete, post, put};
use axum::{Json, Router};
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{CreateStockPosition, StockPosition, UpdateStockPosition};
use crate::services::stock_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_stock))
        .route("/:id", put(update_stock))
        .route("/:id", delete(delete_stock))
}

#[axum::debug_handler]
pub async fn create_stock(
    State(state): State<AppState>,
    Json(data): Json<CreateStockPosition>,
) -> Result<Json<StockPosition>, AppError> {
    info!("POST /stocks - Adding {} to portfolio {}", data.symbol, data.portfolio_id);
    let stock = stock_service::create(&state.pool, data).await.map_err(|e| {
        error!("Failed to create stock position: {}", e);
        e
    })?;
    Ok(Json(stock))
}

pub async fn update_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateStockPosition>,
) -> Result<Json<StockPosition>, AppError> {
    info!("PUT /stocks/{} - Updating stock position", id);
    let stock = stock_service::update(&state.pool, id, data).await?;
    Ok(Json(stock))
}

pub async fn delete_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<()>, AppError> {
    info!("DELETE /stocks/{} - Removing stock position", id);
    stock_service::delete(&state.pool, id).await?;
    Ok(Json(()))
}
