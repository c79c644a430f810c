use sqlx::PgPool;
use std::sync::Arc;

use crate::external::price_provider::PriceProvider;
use crate::services::dca_service::DcaConfig;
use crate::services::llm_service::LlmService;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub price_provider: Arc<dyn PriceProvider>,
    pub llm: Arc<LlmService>,
    pub dca_config: DcaConfig,
}
