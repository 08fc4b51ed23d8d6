pub mod error;
pub mod routes;

use axum::{
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::clock::Clock;
use crate::db::FavoriteStore;
use crate::tracker::PriceTracker;

pub use error::ApiError;

/// State shared by every handler
pub struct AppState {
    pub tracker: Arc<PriceTracker>,
    pub favorites: FavoriteStore,
    pub clock: Arc<dyn Clock>,
}

pub type SharedState = Arc<AppState>;

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/price/{symbol}", get(routes::get_current_price))
        .route("/history/{symbol}", get(routes::get_default_history))
        .route("/history/{symbol}/{days}", get(routes::get_price_history))
        .route("/cryptocurrencies", get(routes::get_cryptocurrencies))
        .route(
            "/favorites",
            get(routes::get_favorites).post(routes::add_favorite),
        )
        .route(
            "/favorites/{symbol}",
            get(routes::is_favorite).delete(routes::remove_favorite),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn start_server(state: SharedState, addr: &str) -> anyhow::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Server running on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, gracefully stopping");
}
