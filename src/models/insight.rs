use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Risk label attached to a generated insight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Medium
    }
}

/// Context assembled for one plan row before asking the LLM for commentary.
/// The numbers here are already final; the narrative layer never alters them.
#[derive(Debug, Clone, Serialize)]
pub struct InsightContext {
    pub symbol: String,
    pub weight: BigDecimal,
    pub amount: BigDecimal,
    pub current_price: BigDecimal,
    pub trailing_average: BigDecimal,
    pub reason: String,
}

/// One generated insight for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcaInsight {
    pub symbol: String,
    pub text: String,
    #[serde(default)]
    pub risk_level: RiskLevel,
}

/// Cached insight set from the database, keyed by (portfolio, day).
#[derive(Debug, Clone, FromRow)]
pub struct CachedInsights {
    pub id: i64,
    pub portfolio_id: Uuid,
    pub day: NaiveDate,
    pub insights: serde_json::Value,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
