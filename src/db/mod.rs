pub mod insight_queries;
pub mod portfolio_queries;
pub mod price_queries;
pub mod recommendation_queries;
pub mod stock_queries;
