pub mod routes;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::cache::open_cache;
use crate::config::AppConfig;
use crate::fetch::PriceFetcher;

pub struct AppState {
    pub fetcher: PriceFetcher,
    pub default_year: i32,
}

pub type SharedState = Arc<AppState>;

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/prices/history_ajax/", get(routes::history_ajax))
        .route("/prices/history_ajax", get(routes::history_ajax))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

pub async fn start_server(config: AppConfig) -> anyhow::Result<()> {
    let cache = open_cache(&config.cache_url).await?;
    let fetcher = PriceFetcher::new(config.fetch.clone(), cache)?;
    if config.fetch.fx_api_key.is_none() {
        tracing::warn!("QUANDL_API_KEY is not set; USD/JPY fetches will fail");
    }

    let state = Arc::new(AppState {
        fetcher,
        default_year: config.default_year,
    });
    let app = create_router(state);

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server running on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
