use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ExternalPricePoint {
    pub date: NaiveDate,
    pub close: BigDecimal,
}

#[derive(Debug, Error)]
pub enum PriceProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited")]
    RateLimited,
}

/// Supplies ordered daily closing prices per symbol. Gaps (non-trading days)
/// are expected; consumers never assume daily continuity.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Fetch up to `days` most recent daily closes, ascending by date.
    async fn fetch_daily_history(
        &self,
        symbol: &str,
        days: u32,
    ) -> Result<Vec<ExternalPricePoint>, PriceProviderError>;
}
