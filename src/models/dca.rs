use bigdecimal::BigDecimal;
use serde::Serialize;

use crate::models::{PricePoint, StockPosition};

/// Everything needed to compute one stock's monthly DCA weight.
/// Built fresh each calculation cycle and never persisted.
#[derive(Debug, Clone)]
pub struct DcaInput {
    pub stock: StockPosition,
    pub current_price: BigDecimal,
    /// Trailing daily closes, most recent first.
    pub price_history: Vec<PricePoint>,
    /// Current actual portfolio weight in percent. `None` when the portfolio
    /// does not track holdings; absence disables the drift signal rather
    /// than implying "perfectly on target".
    pub actual_weight: Option<BigDecimal>,
    pub monthly_budget: BigDecimal,
}

/// The three additive adjustment signals, each drawn from a fixed discrete
/// table and expressed as whole percentage points of relative change.
/// Keeping these integral lets `base * (100 + total) / 100` stay exact in
/// decimal arithmetic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WeightAdjustment {
    pub price_deviation: i32,
    pub portfolio_drift: i32,
    pub volatility_guard: i32,
}

impl WeightAdjustment {
    /// Total relative adjustment in percent. Range: -25 to +20.
    pub fn total(&self) -> i32 {
        self.price_deviation + self.portfolio_drift + self.volatility_guard
    }

    pub fn is_neutral(&self) -> bool {
        self.price_deviation == 0 && self.portfolio_drift == 0 && self.volatility_guard == 0
    }
}
