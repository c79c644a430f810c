use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted monthly purchase recommendation for one
/// (portfolio, month, symbol) triple. Reruns for the same month overwrite
/// prior values; there is no versioning.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DcaRecommendation {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    /// Month token in `YYYY-MM` format.
    pub month: String,
    pub symbol: String,
    /// Allocated currency amount, floored at the configured minimum.
    pub amount: BigDecimal,
    /// Final weight in percent, post-normalization.
    pub weight: BigDecimal,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// One row of a freshly computed plan, before persistence.
#[derive(Debug, Clone, Serialize)]
pub struct PlanRow {
    pub symbol: String,
    pub amount: BigDecimal,
    pub weight: BigDecimal,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationQueryParams {
    pub month: Option<String>,
}
