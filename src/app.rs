use axum::Router;
use tower_http::cors::CorsLayer;

use crate::routes::{health, jobs, performance, portfolios, prices, recommendations, stocks};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/portfolios", portfolios::router())
        .nest("/api/stocks", stocks::router())
        .nest("/api/prices", prices::router())
        .nest("/api/recommendations", recommendations::router())
        .nest("/api/performance", performance::router())
        .nest("/api/jobs", jobs::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
