mod backtest;
mod dca;
mod insight;
mod portfolio;
mod price_point;
mod recommendation;
mod stock_position;

pub use backtest::{BacktestResult, MonthlyPerformance, PerformanceResponse, StrategyComparison};
pub use dca::{DcaInput, WeightAdjustment};
pub use insight::{CachedInsights, DcaInsight, InsightContext, RiskLevel};
pub use portfolio::{CreatePortfolio, Portfolio, UpdatePortfolio};
pub use price_point::PricePoint;
pub use recommendation::{DcaRecommendation, PlanRow, RecommendationQueryParams};
pub use stock_position::{
    validate_weight_bounds, CreateStockPosition, StockPosition, UpdateStockPosition,
};
