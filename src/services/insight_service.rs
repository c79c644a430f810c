use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db;
use crate::errors::AppError;
use crate::models::{DcaInsight, DcaRecommendation, InsightContext};
use crate::services::indicators::{self, TRAILING_WINDOW};
use crate::services::llm_service::LlmService;

/// Generated insight sets are cached per (portfolio, day) for this long.
const CACHE_TTL_HOURS: i64 = 24;

/// Narrative insights for a portfolio's most recent plan.
///
/// Degrades, never fails: an unavailable or misbehaving LLM yields an empty
/// set, since the numeric plan is complete without commentary. Only missing
/// portfolios and database errors surface as errors.
pub async fn portfolio_insights(
    pool: &PgPool,
    llm: &LlmService,
    portfolio_id: Uuid,
) -> Result<Vec<DcaInsight>, AppError> {
    db::portfolio_queries::fetch_one(pool, portfolio_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("portfolio {} not found", portfolio_id)))?;

    let day = Utc::now().date_naive();

    if let Some(cached) = db::insight_queries::get_cached(pool, portfolio_id, day).await? {
        match serde_json::from_value::<Vec<DcaInsight>>(cached.insights) {
            Ok(insights) => {
                info!("Insight cache hit for portfolio {} ({})", portfolio_id, day);
                return Ok(insights);
            }
            Err(e) => {
                warn!("Discarding unreadable cached insights for {}: {}", portfolio_id, e);
            }
        }
    }

    let Some(month) = db::recommendation_queries::fetch_latest_month(pool, portfolio_id).await?
    else {
        return Ok(Vec::new());
    };
    let recommendations =
        db::recommendation_queries::fetch_for_month(pool, portfolio_id, &month).await?;

    let contexts = build_contexts(pool, &recommendations).await?;
    if contexts.is_empty() {
        return Ok(Vec::new());
    }

    let insights = match llm.generate_insights(&contexts).await {
        Ok(insights) => insights,
        Err(e) => {
            // Narrative layer failures are expected operational noise
            warn!("Insight generation failed for portfolio {}: {}", portfolio_id, e);
            return Ok(Vec::new());
        }
    };

    cache_insights(pool, portfolio_id, &insights).await;

    Ok(insights)
}

async fn build_contexts(
    pool: &PgPool,
    recommendations: &[DcaRecommendation],
) -> Result<Vec<InsightContext>, AppError> {
    let mut contexts = Vec::with_capacity(recommendations.len());

    for rec in recommendations {
        let history =
            db::price_queries::fetch_recent(pool, &rec.symbol, TRAILING_WINDOW as i64).await?;
        let Some(latest) = history.first() else {
            continue;
        };

        let closes: Vec<_> = history.iter().map(|p| p.close_price.clone()).collect();
        // A symbol that fell below the window since plan time just reports
        // its latest close as the average
        let trailing_average = indicators::trailing_average(&closes, TRAILING_WINDOW)
            .unwrap_or_else(|_| latest.close_price.clone());

        contexts.push(InsightContext {
            symbol: rec.symbol.clone(),
            weight: rec.weight.clone(),
            amount: rec.amount.clone(),
            current_price: latest.close_price.clone(),
            trailing_average,
            reason: rec.reason.clone(),
        });
    }

    Ok(contexts)
}

async fn cache_insights(pool: &PgPool, portfolio_id: Uuid, insights: &[DcaInsight]) {
    let payload = match serde_json::to_value(insights) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to serialize insights for caching: {}", e);
            return;
        }
    };

    let now = Utc::now();
    let expires_at = now + Duration::hours(CACHE_TTL_HOURS);

    // A cache miss next time is acceptable; a failed store must not fail
    // the request
    if let Err(e) =
        db::insight_queries::store(pool, portfolio_id, now.date_naive(), &payload, now, expires_at)
            .await
    {
        warn!("Failed to cache insights for portfolio {}: {}", portfolio_id, e);
    }
}
