use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{DcaRecommendation, PlanRow};

/// Persist one month's plan for a portfolio. Keyed by
/// (portfolio_id, month, symbol) so that reruns overwrite prior values.
pub async fn upsert_many(
    pool: &PgPool,
    portfolio_id: Uuid,
    month: &str,
    rows: &[PlanRow],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO dca_recommendations
                (id, portfolio_id, month, symbol, amount, weight, reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (portfolio_id, month, symbol)
            DO UPDATE SET amount = EXCLUDED.amount,
                          weight = EXCLUDED.weight,
                          reason = EXCLUDED.reason
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(portfolio_id)
        .bind(month)
        .bind(&row.symbol)
        .bind(&row.amount)
        .bind(&row.weight)
        .bind(&row.reason)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// All recommendations for a portfolio, chronological by month.
pub async fn fetch_for_portfolio(
    pool: &PgPool,
    portfolio_id: Uuid,
) -> Result<Vec<DcaRecommendation>, sqlx::Error> {
    sqlx::query_as::<_, DcaRecommendation>(
        r#"
        SELECT id, portfolio_id, month, symbol, amount, weight, reason, created_at
        FROM dca_recommendations
        WHERE portfolio_id = $1
        ORDER BY month ASC, symbol ASC
        "#,
    )
    .bind(portfolio_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch_for_month(
    pool: &PgPool,
    portfolio_id: Uuid,
    month: &str,
) -> Result<Vec<DcaRecommendation>, sqlx::Error> {
    sqlx::query_as::<_, DcaRecommendation>(
        r#"
        SELECT id, portfolio_id, month, symbol, amount, weight, reason, created_at
        FROM dca_recommendations
        WHERE portfolio_id = $1 AND month = $2
        ORDER BY symbol ASC
        "#,
    )
    .bind(portfolio_id)
    .bind(month)
    .fetch_all(pool)
    .await
}

/// Most recent month token that has recommendations for a portfolio.
pub async fn fetch_latest_month(
    pool: &PgPool,
    portfolio_id: Uuid,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT month
        FROM dca_recommendations
        WHERE portfolio_id = $1
        ORDER BY month DESC
        LIMIT 1
        "#,
    )
    .bind(portfolio_id)
    .fetch_optional(pool)
    .await
}
