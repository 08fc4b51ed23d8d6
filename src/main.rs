use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crypto_price_tracker::{
    api::{self, AppState},
    clock::{Clock, SystemClock},
    config::AppConfig,
    db::Database,
    providers::CoinGeckoProvider,
    PriceTracker,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = AppConfig::from_env();
    if cfg.coingecko_api_key.is_none() {
        tracing::info!("COINGECKO_API_KEY not set, using public API tier");
    }

    let db = Database::connect(&cfg.database_url).await?;
    let provider = CoinGeckoProvider::new(&cfg.coingecko_api_url, cfg.coingecko_api_key.as_deref())?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let tracker = Arc::new(PriceTracker::new(
        Arc::new(provider),
        db.history(),
        clock.clone(),
    ));

    if let Some(days) = cfg.history_retention_days {
        tracker.start_retention_task(days);
    }

    let state = Arc::new(AppState {
        tracker,
        favorites: db.favorites(),
        clock,
    });

    api::start_server(state, &cfg.bind_addr()).await
}
