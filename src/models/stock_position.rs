use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A held or candidate symbol within one portfolio. Weights are percentages
/// in [0, 100] and must satisfy `min_weight <= target_weight <= max_weight`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockPosition {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub symbol: String,
    pub target_weight: BigDecimal,
    pub min_weight: BigDecimal,
    pub max_weight: BigDecimal,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateStockPosition {
    pub portfolio_id: Uuid,
    pub symbol: String,
    pub target_weight: BigDecimal,
    pub min_weight: BigDecimal,
    pub max_weight: BigDecimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateStockPosition {
    pub target_weight: BigDecimal,
    pub min_weight: BigDecimal,
    pub max_weight: BigDecimal,
}

impl StockPosition {
    pub(crate) fn new(input: CreateStockPosition) -> Self {
        Self {
            id: Uuid::new_v4(),
            portfolio_id: input.portfolio_id,
            symbol: input.symbol.to_uppercase(),
            target_weight: input.target_weight,
            min_weight: input.min_weight,
            max_weight: input.max_weight,
            created_at: chrono::Utc::now(),
        }
    }
}

/// Validate the weight-bound ordering shared by create and update payloads.
pub fn validate_weight_bounds(
    target: &BigDecimal,
    min: &BigDecimal,
    max: &BigDecimal,
) -> Result<(), String> {
    let hundred = BigDecimal::from(100);
    if min < &BigDecimal::zero() || max > &hundred {
        return Err("weights must be percentages between 0 and 100".to_string());
    }
    if min > target || target > max {
        return Err("weights must satisfy min_weight <= target_weight <= max_weight".to_string());
    }
    Ok(())
}
