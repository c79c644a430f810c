use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::errors::AppError;
use crate::models::{DcaInsight, DcaRecommendation, RecommendationQueryParams};
use crate::services::insight_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:portfolio_id", get(fetch_recommendations))
        .route("/:portfolio_id/history", get(fetch_recommendation_history))
        .route("/:portfolio_id/insights", get(fetch_insights))
}

/// The current plan: either the requested month or, by default, the most
/// recent month that has stored recommendations.
#[axum::debug_handler]
pub async fn fetch_recommendations(
    State(state): State<AppState>,
    Path(portfolio_id): Path<Uuid>,
    Query(params): Query<RecommendationQueryParams>,
) -> Result<Json<Vec<DcaRecommendation>>, AppError> {
    info!("GET /recommendations/{} - Fetching plan", portfolio_id);

    let month = match params.month {
        Some(month) => month,
        None => db::recommendation_queries::fetch_latest_month(&state.pool, portfolio_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "no recommendations recorded for portfolio {}",
                    portfolio_id
                ))
            })?,
    };

    let recommendations =
        db::recommendation_queries::fetch_for_month(&state.pool, portfolio_id, &month).await?;
    if recommendations.is_empty() {
        return Err(AppError::NotFound(format!(
            "no recommendations for portfolio {} in {}",
            portfolio_id, month
        )));
    }

    Ok(Json(recommendations))
}

pub async fn fetch_recommendation_history(
    State(state): State<AppState>,
    Path(portfolio_id): Path<Uuid>,
) -> Result<Json<Vec<DcaRecommendation>>, AppError> {
    info!("GET /recommendations/{}/history - Fetching all months", portfolio_id);
    let recommendations =
        db::recommendation_queries::fetch_for_portfolio(&state.pool, portfolio_id).await?;
    Ok(Json(recommendations))
}

pub async fn fetch_insights(
    State(state): State<AppState>,
    Path(portfolio_id): Path<Uuid>,
) -> Result<Json<Vec<DcaInsight>>, AppError> {
    info!("GET /recommendations/{}/insights - Fetching insights", portfolio_id);
    let insights =
        insight_service::portfolio_insights(&state.pool, &state.llm, portfolio_id).await?;
    Ok(Json(insights))
}
