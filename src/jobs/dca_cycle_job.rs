//! Monthly DCA cycle job.
//!
//! Refreshes price data for every symbol held in any portfolio, then runs
//! the weight-adjustment cycle per portfolio and upserts the month's
//! recommendations. Rerunning within the same month overwrites that month's
//! rows and nothing else.

use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::db;
use crate::errors::AppError;
use crate::external::price_provider::PriceProvider;
use crate::jobs::JobResult;
use crate::services::{dca_service, price_service};

/// Run the full cycle for every portfolio in the system.
///
/// Price refresh failures are tolerated; the cycle then works from whatever
/// history is already stored, falling back to the equal split when that is
/// too thin.
pub async fn run_for_all_portfolios(
    pool: &PgPool,
    provider: &dyn PriceProvider,
    config: &dca_service::DcaConfig,
) -> Result<JobResult, AppError> {
    info!("🔄 Starting DCA cycle job");

    let portfolios = db::portfolio_queries::fetch_all(pool).await?;
    if portfolios.is_empty() {
        info!("No portfolios found, nothing to process");
        return Ok(JobResult {
            items_processed: 0,
            items_failed: 0,
        });
    }

    let symbols = query_distinct_symbols(pool).await?;
    info!(
        "Refreshing prices for {} symbols across {} portfolios",
        symbols.len(),
        portfolios.len()
    );

    let refresh = price_service::refresh_symbols(pool, provider, &symbols).await;
    if !refresh.failed.is_empty() {
        warn!(
            "⚠️  Price refresh failed for {} of {} symbols, continuing with stored data",
            refresh.failed.len(),
            symbols.len()
        );
    }

    let mut processed = 0;
    let mut failed = 0;

    for portfolio in &portfolios {
        match dca_service::run_cycle(pool, portfolio, config).await {
            Ok(outcome) => {
                info!(
                    "✅ Cycle complete for portfolio {} ({}): {} recommendations",
                    portfolio.id, outcome.month, outcome.recommendations
                );
                processed += 1;
            }
            Err(e) => {
                error!("❌ Cycle failed for portfolio {}: {}", portfolio.id, e);
                failed += 1;
            }
        }
    }

    // Piggyback cache maintenance on the cycle; a failure here never fails
    // the job
    match db::insight_queries::cleanup_expired(pool).await {
        Ok(removed) if removed > 0 => {
            info!("🧹 Removed {} expired insight cache rows", removed)
        }
        Ok(_) => {}
        Err(e) => warn!("Insight cache cleanup failed: {}", e),
    }

    info!(
        "✅ DCA cycle job completed: {} portfolios processed, {} failed",
        processed, failed
    );

    Ok(JobResult {
        items_processed: processed,
        items_failed: failed,
    })
}

/// Every symbol held in any portfolio, deduplicated.
async fn query_distinct_symbols(pool: &PgPool) -> Result<Vec<String>, AppError> {
    let symbols = sqlx::query_scalar::<_, String>(
        r#"
        SELECT DISTINCT symbol
        FROM portfolio_stocks
        ORDER BY symbol
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(AppError::Db)?;

    Ok(symbols)
}
