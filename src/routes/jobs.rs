use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tracing::info;

use crate::errors::AppError;
use crate::jobs::{dca_cycle_job, JobResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/dca-cycle", post(trigger_dca_cycle))
}

/// Manual trigger for the monthly cycle. Idempotent within a month: reruns
/// overwrite the same (portfolio, month, symbol) rows.
#[axum::debug_handler]
pub async fn trigger_dca_cycle(
    State(state): State<AppState>,
) -> Result<Json<JobResult>, AppError> {
    info!("POST /jobs/dca-cycle - Manual cycle trigger");
    let result = dca_cycle_job::run_for_all_portfolios(
        &state.pool,
        state.price_provider.as_ref(),
        &state.dca_config,
    )
    .await?;
    Ok(Json(result))
}
