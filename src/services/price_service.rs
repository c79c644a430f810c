use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::db;
use crate::errors::AppError;
use crate::external::price_provider::{PriceProvider, PriceProviderError};
use crate::models::PricePoint;

/// Daily observations requested per symbol on refresh (~9 months of
/// trading days, comfortably above the signal windows).
const REFRESH_DAYS: u32 = 200;

impl From<PriceProviderError> for AppError {
    fn from(value: PriceProviderError) -> Self {
        match value {
            PriceProviderError::RateLimited => AppError::RateLimited,
            other => AppError::External(other.to_string()),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct RefreshSummary {
    pub refreshed: Vec<String>,
    pub failed: Vec<FailedRefresh>,
}

#[derive(Debug, Serialize)]
pub struct FailedRefresh {
    pub symbol: String,
    pub error: String,
}

/// Pull the latest daily history for one symbol and upsert it. Returns the
/// number of points stored.
pub async fn refresh_symbol(
    pool: &PgPool,
    provider: &dyn PriceProvider,
    symbol: &str,
) -> Result<usize, AppError> {
    let points = provider.fetch_daily_history(symbol, REFRESH_DAYS).await?;
    db::price_queries::upsert_external_points(pool, symbol, &points).await?;
    info!("✓ Refreshed {} price points for {}", points.len(), symbol);
    Ok(points.len())
}

/// Refresh several symbols, isolating failures per symbol. One symbol
/// hitting a provider error never blocks the rest of the batch.
pub async fn refresh_symbols(
    pool: &PgPool,
    provider: &dyn PriceProvider,
    symbols: &[String],
) -> RefreshSummary {
    let mut summary = RefreshSummary::default();

    for symbol in symbols {
        match refresh_symbol(pool, provider, symbol).await {
            Ok(_) => summary.refreshed.push(symbol.clone()),
            Err(e) => {
                warn!("Price refresh failed for {}: {}", symbol, e);
                summary.failed.push(FailedRefresh {
                    symbol: symbol.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    summary
}

/// Full stored history for a symbol, oldest first.
pub async fn history(pool: &PgPool, symbol: &str) -> Result<Vec<PricePoint>, AppError> {
    let points = db::price_queries::fetch_all(pool, symbol).await?;
    if points.is_empty() {
        return Err(AppError::NotFound(format!(
            "no price history for symbol {}",
            symbol
        )));
    }
    Ok(points)
}

pub async fn latest(pool: &PgPool, symbol: &str) -> Result<PricePoint, AppError> {
    db::price_queries::fetch_latest(pool, symbol)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no price history for symbol {}", symbol)))
}
