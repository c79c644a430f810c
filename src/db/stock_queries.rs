use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{StockPosition, UpdateStockPosition};

pub async fn insert(pool: &PgPool, stock: StockPosition) -> Result<StockPosition, sqlx::Error> {
    sqlx::query_as::<_, StockPosition>(
        r#"
        INSERT INTO portfolio_stocks
            (id, portfolio_id, symbol, target_weight, min_weight, max_weight, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, portfolio_id, symbol, target_weight, min_weight, max_weight, created_at
        "#,
    )
    .bind(stock.id)
    .bind(stock.portfolio_id)
    .bind(&stock.symbol)
    .bind(&stock.target_weight)
    .bind(&stock.min_weight)
    .bind(&stock.max_weight)
    .bind(stock.created_at)
    .fetch_one(pool)
    .await
}

pub async fn fetch_by_portfolio(
    pool: &PgPool,
    portfolio_id: Uuid,
) -> Result<Vec<StockPosition>, sqlx::Error> {
    sqlx::query_as::<_, StockPosition>(
        r#"
        SELECT id, portfolio_id, symbol, target_weight, min_weight, max_weight, created_at
        FROM portfolio_stocks
        WHERE portfolio_id = $1
        ORDER BY symbol
        "#,
    )
    .bind(portfolio_id)
    .fetch_all(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    input: UpdateStockPosition,
) -> Result<Option<StockPosition>, sqlx::Error> {
    sqlx::query_as::<_, StockPosition>(
        r#"
        UPDATE portfolio_stocks
        SET target_weight = $2, min_weight = $3, max_weight = $4
        WHERE id = $1
        RETURNING id, portfolio_id, symbol, target_weight, min_weight, max_weight, created_at
        "#,
    )
    .bind(id)
    .bind(&input.target_weight)
    .bind(&input.min_weight)
    .bind(&input.max_weight)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM portfolio_stocks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
