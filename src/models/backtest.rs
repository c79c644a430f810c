use bigdecimal::BigDecimal;
use serde::Serialize;
use std::collections::HashMap;

/// Replay aggregate for one strategy. Derived on every request,
/// never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub total_invested: BigDecimal,
    /// Mark-to-market value using each symbol's most recent available price.
    pub current_value: BigDecimal,
    pub return_pct: f64,
    pub monthly: Vec<MonthlyPerformance>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyPerformance {
    pub month: String,
    /// Amount actually invested this month (symbols with no usable price
    /// contribute zero).
    pub invested: BigDecimal,
    /// Cumulative shares per symbol after this month's purchases.
    pub shares: HashMap<String, BigDecimal>,
    /// Portfolio value priced as of this month's buy date.
    pub value: BigDecimal,
    pub cumulative_return_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyComparison {
    pub plan: BacktestResult,
    pub equal_split: BacktestResult,
    pub value_diff: BigDecimal,
    pub return_diff_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceResponse {
    pub comparison: StrategyComparison,
    pub months_analyzed: usize,
    pub symbols: Vec<String>,
}
