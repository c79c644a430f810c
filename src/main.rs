mod app;
mod db;
mod errors;
mod external;
mod jobs;
mod logging;
mod models;
mod routes;
mod services;
mod state;

use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::external::alphavantage::AlphaVantageProvider;
use crate::logging::LoggingConfig;
use crate::services::dca_service::DcaConfig;
use crate::services::llm_service::{LlmConfig, LlmService};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    logging::init_logging(LoggingConfig::from_env())?;

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let provider = Arc::new(AlphaVantageProvider::from_env()?);
    tracing::info!("📊 Using price provider: Alpha Vantage");

    let llm = Arc::new(LlmService::new(LlmConfig::from_env()));
    let dca_config = DcaConfig::from_env();

    let state = AppState {
        pool,
        price_provider: provider,
        llm,
        dca_config,
    };
    let app = app::create_app(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🚀 DCA Pilot backend running at http://{}/", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
