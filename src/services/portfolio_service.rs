use bigdecimal::{BigDecimal, Zero};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::errors::AppError;
use crate::models::{CreatePortfolio, Portfolio, UpdatePortfolio};

fn validate(name: &str, monthly_budget: &BigDecimal) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("portfolio name is required".to_string()));
    }
    if monthly_budget <= &BigDecimal::zero() {
        return Err(AppError::Validation(
            "monthly budget must be positive".to_string(),
        ));
    }
    Ok(())
}

pub async fn create(pool: &PgPool, input: CreatePortfolio) -> Result<Portfolio, AppError> {
    validate(&input.name, &input.monthly_budget)?;
    let portfolio = Portfolio::new(input.name, input.monthly_budget);
    Ok(db::portfolio_queries::insert(pool, portfolio).await?)
}

pub async fn list(pool: &PgPool) -> Result<Vec<Portfolio>, AppError> {
    Ok(db::portfolio_queries::fetch_all(pool).await?)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Portfolio, AppError> {
    db::portfolio_queries::fetch_one(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("portfolio {} not found", id)))
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    input: UpdatePortfolio,
) -> Result<Portfolio, AppError> {
    validate(&input.name, &input.monthly_budget)?;
    db::portfolio_queries::update(pool, id, input)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("portfolio {} not found", id)))
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    let deleted = db::portfolio_queries::delete(pool, id).await?;
    if deleted == 0 {
        return Err(AppError::NotFound(format!("portfolio {} not found", id)));
    }
    Ok(())
}
