use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// One (symbol, date, close) observation. Unique on (symbol, date),
// append-only, cached from the external price provider.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PricePoint {
    pub id: Uuid,
    pub symbol: String,
    pub date: NaiveDate,
    pub close_price: BigDecimal,
    pub created_at: DateTime<Utc>,
}

impl PricePoint {
    #[cfg(test)]
    pub fn test_point(symbol: &str, date: NaiveDate, close_price: BigDecimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            date,
            close_price,
            created_at: Utc::now(),
        }
    }
}
