//! # Crypto Price Tracker
//!
//! A small backend that proxies the CoinGecko API, caches current prices for
//! 60 seconds, records every observed price in SQLite and keeps a favorites
//! list.
//!
//! ## Current prices
//!
//! ```no_run
//! use std::sync::Arc;
//! use crypto_price_tracker::{clock::SystemClock, db::Database, providers::CoinGeckoProvider, PriceTracker};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("sqlite::memory:").await?;
//! let tracker = PriceTracker::new(
//!     Arc::new(CoinGeckoProvider::public()?),
//!     db.history(),
//!     Arc::new(SystemClock),
//! );
//!
//! let btc = tracker.get_current_price("btc").await?;
//! println!("BTC: ${:.2}", btc.price_usd());
//! # Ok(())
//! # }
//! ```
//!
//! ## History
//!
//! `get_price_history` prefers local rows. Only when nothing is stored for the
//! requested window does it ask CoinGecko, and the returned points are written
//! back in the background so the next request is answered locally.
//!
//! ```no_run
//! # use crypto_price_tracker::PriceTracker;
//! # async fn example(tracker: &PriceTracker) -> Result<(), Box<dyn std::error::Error>> {
//! let week = tracker.get_price_history("eth", 7).await?;
//! for point in &week.data {
//!     println!("{} {:.2}", point.timestamp, point.price);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! ```no_run
//! use crypto_price_tracker::{PriceError, PriceTracker};
//!
//! # async fn example(tracker: &PriceTracker) {
//! match tracker.get_current_price("doge").await {
//!     Ok(price) => println!("DOGE: ${:.4}", price.price_usd()),
//!     Err(PriceError::PriceFetchFailed { symbol, source }) => {
//!         eprintln!("Could not fetch {}: {}", symbol, source)
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod metrics;
pub mod provider;
pub mod providers;
pub mod resolver;
pub mod tracker;
pub mod types;

// Re-export commonly used types
pub use error::{PriceError, ProviderError, StoreError};
pub use metrics::ProviderMetrics;
pub use tracker::PriceTracker;
pub use types::{
    ComponentHealth, FavoriteRecord, HealthStatus, HistoryRecord, PriceHistory, PricePoint,
    PriceSnapshot,
};
