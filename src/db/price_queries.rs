use sqlx::PgPool;
use std::collections::HashMap;
use tracing::error;
use uuid::Uuid;

use crate::external::price_provider::ExternalPricePoint;
use crate::models::PricePoint;

pub async fn fetch_all(pool: &PgPool, symbol: &str) -> Result<Vec<PricePoint>, sqlx::Error> {
    sqlx::query_as::<_, PricePoint>(
        r#"
        SELECT id, symbol, date, close_price, created_at
        FROM price_points
        WHERE symbol = $1
        ORDER BY date ASC
        "#,
    )
    .bind(symbol)
    .fetch_all(pool)
    .await
}

pub async fn fetch_latest(pool: &PgPool, symbol: &str) -> Result<Option<PricePoint>, sqlx::Error> {
    sqlx::query_as::<_, PricePoint>(
        r#"
        SELECT id, symbol, date, close_price, created_at
        FROM price_points
        WHERE symbol = $1
        ORDER BY date DESC
        LIMIT 1
        "#,
    )
    .bind(symbol)
    .fetch_optional(pool)
    .await
}

/// Fetch the most recent N observations for a symbol, most recent first.
/// This is the ordering the signal calculators expect.
pub async fn fetch_recent(
    pool: &PgPool,
    symbol: &str,
    limit: i64,
) -> Result<Vec<PricePoint>, sqlx::Error> {
    sqlx::query_as::<_, PricePoint>(
        r#"
        SELECT id, symbol, date, close_price, created_at
        FROM price_points
        WHERE symbol = $1
        ORDER BY date DESC
        LIMIT $2
        "#,
    )
    .bind(symbol)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Fetch the full history for several symbols in one query,
/// grouped by symbol and ordered ascending by date (oldest first).
pub async fn fetch_history_map(
    pool: &PgPool,
    symbols: &[String],
) -> Result<HashMap<String, Vec<PricePoint>>, sqlx::Error> {
    if symbols.is_empty() {
        return Ok(HashMap::new());
    }

    let points = sqlx::query_as::<_, PricePoint>(
        r#"
        SELECT id, symbol, date, close_price, created_at
        FROM price_points
        WHERE symbol = ANY($1)
        ORDER BY symbol, date ASC
        "#,
    )
    .bind(symbols)
    .fetch_all(pool)
    .await?;

    let mut map: HashMap<String, Vec<PricePoint>> = HashMap::new();
    for point in points {
        map.entry(point.symbol.clone()).or_default().push(point);
    }

    Ok(map)
}

pub async fn upsert_external_points(
    pool: &PgPool,
    symbol: &str,
    points: &[ExternalPricePoint],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await.map_err(|e| {
        error!("Failed to begin transaction for symbol {}: {}", symbol, e);
        e
    })?;

    for p in points {
        sqlx::query(
            r#"
            INSERT INTO price_points (id, symbol, date, close_price)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (symbol, date)
            DO UPDATE SET close_price = EXCLUDED.close_price
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(symbol)
        .bind(p.date)
        .bind(&p.close)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await.map_err(|e| {
        error!("Failed to commit transaction for symbol {}: {}", symbol, e);
        e
    })?;
    Ok(())
}
