use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Portfolio, UpdatePortfolio};

pub async fn insert(pool: &PgPool, portfolio: Portfolio) -> Result<Portfolio, sqlx::Error> {
    sqlx::query_as::<_, Portfolio>(
        r#"
        INSERT INTO portfolios (id, name, monthly_budget, created_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, monthly_budget, created_at
        "#,
    )
    .bind(portfolio.id)
    .bind(&portfolio.name)
    .bind(&portfolio.monthly_budget)
    .bind(portfolio.created_at)
    .fetch_one(pool)
    .await
}

pub async fn fetch_all(pool: &PgPool) -> Result<Vec<Portfolio>, sqlx::Error> {
    sqlx::query_as::<_, Portfolio>(
        r#"
        SELECT id, name, monthly_budget, created_at
        FROM portfolios
        ORDER BY created_at
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn fetch_one(pool: &PgPool, id: Uuid) -> Result<Option<Portfolio>, sqlx::Error> {
    sqlx::query_as::<_, Portfolio>(
        r#"
        SELECT id, name, monthly_budget, created_at
        FROM portfolios
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    input: UpdatePortfolio,
) -> Result<Option<Portfolio>, sqlx::Error> {
    sqlx::query_as::<_, Portfolio>(
        r#"
        UPDATE portfolios
        SET name = $2, monthly_budget = $3
        WHERE id = $1
        RETURNING id, name, monthly_budget, created_at
        "#,
    )
    .bind(id)
    .bind(&input.name)
    .bind(&input.monthly_budget)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM portfolios WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
