//! Provider abstraction for the remote market data API

use crate::{
    error::ProviderError,
    types::{MarketCoin, PricePoint, PriceSnapshot},
};
use async_trait::async_trait;

/// Trait for remote market data providers
///
/// All methods take the provider's own coin id (see `resolver::resolve`),
/// never a raw ticker.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetches current market data for a single coin
    async fn fetch_snapshot(&self, coin_id: &str) -> Result<PriceSnapshot, ProviderError>;

    /// Fetches the USD price series covering the last `days` days
    ///
    /// Points are returned in the order the provider reports them.
    async fn fetch_price_series(
        &self,
        coin_id: &str,
        days: u32,
    ) -> Result<Vec<PricePoint>, ProviderError>;

    /// Fetches one page of coins ordered by market cap
    async fn fetch_markets(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<MarketCoin>, ProviderError>;

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::types::CurrencyPrices;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock provider for testing
    ///
    /// Responses are keyed by coin id. Errors are stored as messages and
    /// surfaced as `ProviderError::ApiError`, which is not retried.
    #[derive(Default)]
    pub struct MockProvider {
        snapshots: Mutex<HashMap<String, Result<PriceSnapshot, String>>>,
        series: Mutex<HashMap<String, Result<Vec<PricePoint>, String>>>,
        markets: Mutex<Option<Result<Vec<MarketCoin>, String>>>,
        snapshot_calls: AtomicUsize,
        series_calls: AtomicUsize,
        market_calls: AtomicUsize,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_price(&self, coin_id: &str, symbol: &str, usd: f64) {
            let snapshot = PriceSnapshot {
                coin_id: coin_id.to_string(),
                symbol: symbol.to_string(),
                name: coin_id.to_string(),
                image_url: None,
                price_by_currency: CurrencyPrices {
                    usd,
                    eur: Some(usd * 0.9),
                    gbp: Some(usd * 0.8),
                },
                market_cap_usd: None,
                price_change_24h_pct: None,
                last_updated: None,
            };
            self.snapshots
                .lock()
                .unwrap()
                .insert(coin_id.to_string(), Ok(snapshot));
        }

        pub fn set_price_error(&self, coin_id: &str, message: &str) {
            self.snapshots
                .lock()
                .unwrap()
                .insert(coin_id.to_string(), Err(message.to_string()));
        }

        pub fn set_series(&self, coin_id: &str, points: Vec<PricePoint>) {
            self.series
                .lock()
                .unwrap()
                .insert(coin_id.to_string(), Ok(points));
        }

        pub fn set_series_error(&self, coin_id: &str, message: &str) {
            self.series
                .lock()
                .unwrap()
                .insert(coin_id.to_string(), Err(message.to_string()));
        }

        pub fn set_markets(&self, coins: Vec<MarketCoin>) {
            *self.markets.lock().unwrap() = Some(Ok(coins));
        }

        pub fn snapshot_calls(&self) -> usize {
            self.snapshot_calls.load(Ordering::SeqCst)
        }

        pub fn series_calls(&self) -> usize {
            self.series_calls.load(Ordering::SeqCst)
        }

        pub fn market_calls(&self) -> usize {
            self.market_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        async fn fetch_snapshot(&self, coin_id: &str) -> Result<PriceSnapshot, ProviderError> {
            self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
            match self.snapshots.lock().unwrap().get(coin_id) {
                Some(Ok(snapshot)) => Ok(snapshot.clone()),
                Some(Err(msg)) => Err(ProviderError::ApiError(msg.clone())),
                None => Err(ProviderError::ApiError(format!("HTTP 404: {coin_id}"))),
            }
        }

        async fn fetch_price_series(
            &self,
            coin_id: &str,
            _days: u32,
        ) -> Result<Vec<PricePoint>, ProviderError> {
            self.series_calls.fetch_add(1, Ordering::SeqCst);
            match self.series.lock().unwrap().get(coin_id) {
                Some(Ok(points)) => Ok(points.clone()),
                Some(Err(msg)) => Err(ProviderError::ApiError(msg.clone())),
                None => Err(ProviderError::ApiError(format!("HTTP 404: {coin_id}"))),
            }
        }

        async fn fetch_markets(
            &self,
            _page: u32,
            _per_page: u32,
        ) -> Result<Vec<MarketCoin>, ProviderError> {
            self.market_calls.fetch_add(1, Ordering::SeqCst);
            match self.markets.lock().unwrap().as_ref() {
                Some(Ok(coins)) => Ok(coins.clone()),
                Some(Err(msg)) => Err(ProviderError::ApiError(msg.clone())),
                None => Ok(Vec::new()),
            }
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }
}
