use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::errors::AppError;
use crate::models::{
    validate_weight_bounds, CreateStockPosition, StockPosition, UpdateStockPosition,
};

pub async fn create(pool: &PgPool, input: CreateStockPosition) -> Result<StockPosition, AppError> {
    if input.symbol.trim().is_empty() {
        return Err(AppError::Validation("symbol is required".to_string()));
    }
    validate_weight_bounds(&input.target_weight, &input.min_weight, &input.max_weight)
        .map_err(AppError::Validation)?;

    // The foreign key would catch this too, but a 404 is the honest answer
    db::portfolio_queries::fetch_one(pool, input.portfolio_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("portfolio {} not found", input.portfolio_id))
        })?;

    let stock = StockPosition::new(input);
    Ok(db::stock_queries::insert(pool, stock).await?)
}

pub async fn list_for_portfolio(
    pool: &PgPool,
    portfolio_id: Uuid,
) -> Result<Vec<StockPosition>, AppError> {
    Ok(db::stock_queries::fetch_by_portfolio(pool, portfolio_id).await?)
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    input: UpdateStockPosition,
) -> Result<StockPosition, AppError> {
    validate_weight_bounds(&input.target_weight, &input.min_weight, &input.max_weight)
        .map_err(AppError::Validation)?;

    db::stock_queries::update(pool, id, input)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("stock position {} not found", id)))
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    let deleted = db::stock_queries::delete(pool, id).await?;
    if deleted == 0 {
        return Err(AppError::NotFound(format!("stock position {} not found", id)));
    }
    Ok(())
}
