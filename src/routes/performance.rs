use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::PerformanceResponse;
use crate::services::backtest_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/:portfolio_id", get(fetch_performance))
}

/// Backtest comparison of the stored plan against the equal-split baseline.
#[axum::debug_handler]
pub async fn fetch_performance(
    State(state): State<AppState>,
    Path(portfolio_id): Path<Uuid>,
) -> Result<Json<PerformanceResponse>, AppError> {
    info!("GET /performance/{} - Running strategy comparison", portfolio_id);
    let response =
        backtest_service::portfolio_performance(&state.pool, portfolio_id, &state.dca_config)
            .await?;
    Ok(Json(response))
}
