pub mod backtest_service;
pub mod dca_service;
pub mod indicators;
pub mod insight_service;
pub mod llm_service;
pub mod portfolio_service;
pub mod price_service;
pub mod stock_service;
