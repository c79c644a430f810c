use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// A user-defined portfolio with a fixed monthly DCA budget.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Portfolio {
    pub id: uuid::Uuid,
    pub name: String,
    pub monthly_budget: BigDecimal,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePortfolio {
    pub name: String,
    pub monthly_budget: BigDecimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatePortfolio {
    pub name: String,
    pub monthly_budget: BigDecimal,
}

impl Portfolio {
    pub(crate) fn new(name: String, monthly_budget: BigDecimal) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            name,
            monthly_budget,
            created_at: chrono::Utc::now(),
        }
    }
}
