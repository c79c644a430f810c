use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::CachedInsights;

/// Retrieve the non-expired insight set for a (portfolio, day) pair.
pub async fn get_cached(
    pool: &PgPool,
    portfolio_id: Uuid,
    day: NaiveDate,
) -> Result<Option<CachedInsights>, sqlx::Error> {
    sqlx::query_as::<_, CachedInsights>(
        r#"
        SELECT id, portfolio_id, day, insights, generated_at, expires_at
        FROM dca_insights
        WHERE portfolio_id = $1
          AND day = $2
          AND expires_at > NOW()
        ORDER BY generated_at DESC
        LIMIT 1
        "#,
    )
    .bind(portfolio_id)
    .bind(day)
    .fetch_optional(pool)
    .await
}

/// Store a generated insight set in the cache.
pub async fn store(
    pool: &PgPool,
    portfolio_id: Uuid,
    day: NaiveDate,
    insights: &serde_json::Value,
    generated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO dca_insights (portfolio_id, day, insights, generated_at, expires_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (portfolio_id, day)
        DO UPDATE SET insights = EXCLUDED.insights,
                      generated_at = EXCLUDED.generated_at,
                      expires_at = EXCLUDED.expires_at
        "#,
    )
    .bind(portfolio_id)
    .bind(day)
    .bind(insights)
    .bind(generated_at)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete expired insight rows (periodic cleanup).
pub async fn cleanup_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM dca_insights WHERE expires_at < NOW()")
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
