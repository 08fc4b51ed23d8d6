//! Price tracker service
//!
//! Coordinates the cache, the local history store and the remote provider:
//!
//! ```text
//! get_current_price(symbol)
//!     ↓
//! PriceCache (60s) ── hit ──→ snapshot
//!     ↓ miss
//! resolve(symbol) → MarketDataProvider::fetch_snapshot
//!     ↓
//! PriceCache::put + HistoryStore::save → snapshot
//!
//! get_price_history(symbol, days)
//!     ↓
//! HistoryStore::range ── non-empty ──→ local points
//!     ↓ empty
//! MarketDataProvider::fetch_price_series → remote points
//!     ↓ (detached)
//! HistoryStore::save per point
//! ```

use crate::{
    cache::PriceCache,
    clock::Clock,
    constants::{
        INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_PER_PAGE, MAX_RETRY_ATTEMPTS, RETENTION_SWEEP_SECS,
    },
    db::HistoryStore,
    error::{PriceError, ProviderError, StoreError},
    metrics::{MetricsCollector, ProviderMetrics},
    provider::MarketDataProvider,
    resolver::resolve,
    types::{
        ComponentHealth, HealthStatus, HistoryRecord, MarketCoin, PriceHistory, PricePoint,
        PriceSnapshot,
    },
};
use chrono::{DateTime, TimeDelta, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Retry settings for remote calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRY_ATTEMPTS,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
        }
    }
}

/// Price tracker
///
/// Cheap to share behind an `Arc`; every request handler calls into the same
/// instance so they all see one cache.
pub struct PriceTracker {
    cache: Arc<PriceCache>,
    history: HistoryStore,
    provider: Arc<dyn MarketDataProvider>,
    metrics: Arc<MetricsCollector>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl PriceTracker {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        history: HistoryStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = Arc::new(PriceCache::new(clock.clone()));
        let metrics = Arc::new(MetricsCollector::new(provider.provider_name()));

        Self {
            cache,
            history,
            provider,
            metrics,
            clock,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Gets the current price for `symbol`, served from cache when fresh
    ///
    /// A cache miss fetches from the provider, caches the snapshot and records
    /// the USD price in history. Failing to record history is logged and does
    /// not fail the call.
    pub async fn get_current_price(&self, symbol: &str) -> Result<PriceSnapshot, PriceError> {
        let symbol = symbol.to_lowercase();

        if let Some(snapshot) = self.cache.get(&symbol).await {
            tracing::debug!(symbol = %symbol, "Price cache hit");
            return Ok(snapshot);
        }

        let coin_id = resolve(&symbol);
        let snapshot = self
            .call_provider("fetch_snapshot", || self.provider.fetch_snapshot(&coin_id))
            .await
            .map_err(|e| {
                tracing::error!(symbol = %symbol, coin_id = %coin_id, error = %e, "Failed to fetch price");
                PriceError::price_fetch_failed(&symbol, e)
            })?;

        self.cache.put(&symbol, snapshot.clone()).await;

        let record = HistoryRecord::new(&symbol, snapshot.price_usd(), self.clock.now());
        if let Err(e) = self.history.save(&record).await {
            tracing::warn!(symbol = %symbol, error = %e, "Failed to record price history");
        }

        Ok(snapshot)
    }

    /// Gets `days` days of price history for `symbol`
    ///
    /// Local rows win whenever any exist in the window, however sparse. Only
    /// an empty window goes to the provider; the remote points are then
    /// persisted in the background so later calls are served locally.
    pub async fn get_price_history(
        &self,
        symbol: &str,
        days: u32,
    ) -> Result<PriceHistory, PriceError> {
        if days == 0 {
            return Err(PriceError::invalid_input("days must be at least 1"));
        }
        let symbol = symbol.to_lowercase();
        let now = self.clock.now();
        let start = days_before(now, days);

        let local = self.history.range(&symbol, start, now).await?;
        if !local.is_empty() {
            tracing::debug!(symbol = %symbol, days, count = local.len(), "Serving history from local store");
            return Ok(PriceHistory {
                symbol,
                data: local.iter().map(PricePoint::from).collect(),
            });
        }

        let coin_id = resolve(&symbol);
        let points = self
            .call_provider("fetch_price_series", || {
                self.provider.fetch_price_series(&coin_id, days)
            })
            .await
            .map_err(|e| {
                tracing::error!(symbol = %symbol, coin_id = %coin_id, error = %e, "Failed to fetch price history");
                PriceError::history_fetch_failed(&symbol, e)
            })?;

        self.spawn_backfill(&symbol, &points);

        Ok(PriceHistory {
            symbol,
            data: points,
        })
    }

    /// Lists one page of coins by market cap
    ///
    /// `page` starts at 1 and `per_page` must be within `1..=250`.
    pub async fn list_cryptocurrencies(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<MarketCoin>, PriceError> {
        if page < 1 || per_page < 1 || per_page > MAX_PER_PAGE {
            return Err(PriceError::invalid_input(format!(
                "Page must be >= 1 and perPage must be between 1 and {MAX_PER_PAGE}"
            )));
        }

        self.call_provider("fetch_markets", || self.provider.fetch_markets(page, per_page))
            .await
            .map_err(|e| {
                tracing::error!(page, per_page, error = %e, "Failed to fetch cryptocurrencies list");
                PriceError::ListingFetchFailed(e)
            })
    }

    /// Persists remotely fetched points without holding up the caller
    fn spawn_backfill(&self, symbol: &str, points: &[PricePoint]) {
        let history = self.history.clone();
        let symbol = symbol.to_string();
        let points = points.to_vec();

        tokio::spawn(async move {
            backfill(&history, &symbol, &points).await;
        });
    }

    /// Deletes history older than `retention_days` days
    pub async fn purge_history(&self, retention_days: u32) -> Result<u64, StoreError> {
        let cutoff = days_before(self.clock.now(), retention_days);
        let removed = self.history.purge_older_than(cutoff).await?;
        tracing::info!(removed, cutoff = %cutoff, "Purged old price history");
        Ok(removed)
    }

    /// Starts the periodic history retention sweep
    pub fn start_retention_task(self: &Arc<Self>, retention_days: u32) -> JoinHandle<()> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            tracing::info!(
                retention_days,
                sweep_interval_secs = RETENTION_SWEEP_SECS,
                "Starting history retention task"
            );

            let mut interval = tokio::time::interval(Duration::from_secs(RETENTION_SWEEP_SECS));
            loop {
                interval.tick().await;
                if let Err(e) = tracker.purge_history(retention_days).await {
                    tracing::warn!(error = %e, "History retention sweep failed");
                }
            }
        })
    }

    /// Calls the provider with retry and backoff, recording one metrics sample
    async fn call_provider<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, ProviderError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let start = Instant::now();
        let mut backoff = self.retry.initial_backoff;
        let mut attempt = 1;

        loop {
            match call().await {
                Ok(value) => {
                    tracing::debug!(
                        operation,
                        attempt,
                        provider = self.provider.provider_name(),
                        latency_ms = start.elapsed().as_millis() as u64,
                        "Provider call succeeded"
                    );
                    self.metrics.record_request(start.elapsed(), true).await;
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %e,
                        "Provider call failed, retrying"
                    );
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(self.retry.max_backoff);
                    attempt += 1;
                }
                Err(e) => {
                    self.metrics.record_request(start.elapsed(), false).await;
                    return Err(e);
                }
            }
        }
    }

    /// Returns the name of the current provider
    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// Gets provider metrics including latency percentiles and success rates
    pub async fn get_provider_metrics(&self) -> ProviderMetrics {
        self.metrics.get_metrics().await
    }

    /// Reports tracker health based on recent provider calls
    pub async fn health_check(&self) -> ComponentHealth {
        let metrics = self.get_provider_metrics().await;
        let mut details = std::collections::HashMap::new();

        details.insert(
            "provider_name".to_string(),
            serde_json::json!(self.provider_name()),
        );
        details.insert(
            "cache_entries".to_string(),
            serde_json::json!(self.cache.len().await),
        );
        details.insert(
            "provider_metrics".to_string(),
            serde_json::to_value(&metrics).unwrap_or_default(),
        );

        let status = if metrics.total_requests == 0 || metrics.recent_success_rate >= 0.9 {
            HealthStatus::Healthy
        } else if metrics.recent_success_rate > 0.0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        };

        let message = match status {
            HealthStatus::Healthy => "Price tracker is operational".to_string(),
            HealthStatus::Degraded => format!(
                "{:.0}% of recent provider calls failed",
                (1.0 - metrics.recent_success_rate) * 100.0
            ),
            HealthStatus::Unhealthy => "All recent provider calls failed".to_string(),
        };

        ComponentHealth {
            name: "price_tracker".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: self.clock.now(),
        }
    }
}

/// `days` days before `now`, saturating at the earliest representable instant
fn days_before(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    TimeDelta::try_days(i64::from(days))
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Saves each point under `symbol`, returning how many were written.
///
/// Failed inserts are logged and skipped; nothing is reported back.
async fn backfill(history: &HistoryStore, symbol: &str, points: &[PricePoint]) -> usize {
    let mut saved = 0usize;
    for point in points {
        let Some(timestamp) = DateTime::from_timestamp_millis(point.timestamp) else {
            tracing::warn!(symbol = %symbol, timestamp = point.timestamp, "Skipping backfill point with invalid timestamp");
            continue;
        };
        match history
            .save(&HistoryRecord::new(symbol, point.price, timestamp))
            .await
        {
            Ok(_) => saved += 1,
            Err(e) => {
                tracing::warn!(symbol = %symbol, timestamp = point.timestamp, error = %e, "Failed to save backfill point");
            }
        }
    }
    tracing::debug!(symbol = %symbol, saved, total = points.len(), "Backfill finished");
    saved
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use crate::clock::mock::ManualClock;
    use crate::constants::CACHE_TTL_MS;
    use crate::db::test_db;
    use crate::provider::mock::MockProvider;

    struct Harness {
        tracker: Arc<PriceTracker>,
        provider: Arc<MockProvider>,
        history: HistoryStore,
        clock: Arc<ManualClock>,
    }

    async fn harness() -> Harness {
        let provider = Arc::new(MockProvider::new());
        let history = test_db().await.history();
        let clock = Arc::new(ManualClock::default());
        let tracker = PriceTracker::new(provider.clone(), history.clone(), clock.clone())
            .with_retry_policy(RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
            });

        Harness {
            tracker: Arc::new(tracker),
            provider,
            history,
            clock,
        }
    }

    /// Polls until the detached backfill has written at least `min` rows
    async fn wait_for_rows(history: &HistoryStore, symbol: &str, min: usize) -> usize {
        for _ in 0..200 {
            let n = history.recent(symbol, Some(1000)).await.unwrap().len();
            if n >= min {
                return n;
            }
            sleep(Duration::from_millis(5)).await;
        }
        history.recent(symbol, Some(1000)).await.unwrap().len()
    }

    #[tokio::test]
    async fn second_call_within_ttl_is_served_from_cache() {
        let h = harness().await;
        h.provider.set_price("bitcoin", "btc", 67000.0);

        let first = h.tracker.get_current_price("BTC").await.unwrap();
        h.clock.advance_millis(1_000);
        let second = h.tracker.get_current_price("btc").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(h.provider.snapshot_calls(), 1);
        assert_eq!(h.history.recent("btc", Some(10)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn call_after_ttl_fetches_again() {
        let h = harness().await;
        h.provider.set_price("ethereum", "eth", 3800.0);

        h.tracker.get_current_price("eth").await.unwrap();
        h.clock.advance_millis(CACHE_TTL_MS);
        h.provider.set_price("ethereum", "eth", 3810.0);
        let refreshed = h.tracker.get_current_price("eth").await.unwrap();

        assert_eq!(refreshed.price_usd(), 3810.0);
        assert_eq!(h.provider.snapshot_calls(), 2);

        let prices: Vec<f64> = h
            .history
            .recent("eth", Some(10))
            .await
            .unwrap()
            .iter()
            .map(|r| r.price)
            .collect();
        assert_eq!(prices, vec![3810.0, 3800.0]);
    }

    #[tokio::test]
    async fn history_is_recorded_under_requested_symbol() {
        let h = harness().await;
        h.provider.set_price("bitcoin", "btc", 1.0);

        h.tracker.get_current_price("bitcoin").await.unwrap();
        let rows = h.history.recent("bitcoin", Some(10)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, h.clock.now());
    }

    #[tokio::test]
    async fn fetch_failure_is_wrapped_with_symbol() {
        let h = harness().await;
        h.provider.set_price_error("dogecoin", "HTTP 500: boom");

        let err = h.tracker.get_current_price("DOGE").await.unwrap_err();
        assert!(matches!(err, PriceError::PriceFetchFailed { ref symbol, .. } if symbol == "doge"));
        assert!(h.history.recent("doge", Some(10)).await.unwrap().is_empty());

        let metrics = h.tracker.get_provider_metrics().await;
        assert_eq!(metrics.failed_requests, 1);
    }

    #[tokio::test]
    async fn local_history_wins_and_skips_remote() {
        let h = harness().await;
        let now = h.clock.now();
        h.history
            .save(&HistoryRecord::new("sol", 150.0, now - ChronoDuration::hours(1)))
            .await
            .unwrap();
        h.provider.set_series(
            "solana",
            vec![PricePoint {
                timestamp: now.timestamp_millis(),
                price: 999.0,
            }],
        );

        let history = h.tracker.get_price_history("SOL", 7).await.unwrap();

        assert_eq!(h.provider.series_calls(), 0);
        assert_eq!(history.symbol, "sol");
        assert_eq!(history.data.len(), 1);
        assert_eq!(history.data[0].price, 150.0);
    }

    #[tokio::test]
    async fn rows_outside_window_do_not_count() {
        let h = harness().await;
        let now = h.clock.now();
        h.history
            .save(&HistoryRecord::new("eth", 1.0, now - ChronoDuration::days(10)))
            .await
            .unwrap();
        h.provider.set_series(
            "ethereum",
            vec![PricePoint {
                timestamp: (now - ChronoDuration::days(1)).timestamp_millis(),
                price: 3700.0,
            }],
        );

        let history = h.tracker.get_price_history("eth", 3).await.unwrap();
        assert_eq!(h.provider.series_calls(), 1);
        assert_eq!(history.data[0].price, 3700.0);
    }

    #[tokio::test]
    async fn empty_store_backfills_from_remote() {
        let h = harness().await;
        let now = h.clock.now();
        let series: Vec<PricePoint> = (1..=3)
            .map(|i| PricePoint {
                timestamp: (now - ChronoDuration::hours(i)).timestamp_millis(),
                price: 3000.0 + i as f64,
            })
            .collect();
        h.provider.set_series("ethereum", series.clone());

        let history = h.tracker.get_price_history("eth", 3).await.unwrap();
        assert_eq!(history.data, series);

        assert_eq!(wait_for_rows(&h.history, "eth", 3).await, 3);

        // Now served locally
        let again = h.tracker.get_price_history("eth", 3).await.unwrap();
        assert_eq!(h.provider.series_calls(), 1);
        assert_eq!(again.data.len(), 3);
    }

    #[tokio::test]
    async fn huge_day_span_saturates_the_window() {
        let h = harness().await;
        let now = h.clock.now();
        let series = vec![PricePoint {
            timestamp: now.timestamp_millis(),
            price: 60000.0,
        }];
        h.provider.set_series("bitcoin", series.clone());

        let history = h.tracker.get_price_history("btc", 100_000_000).await.unwrap();
        assert_eq!(history.data, series);
        assert_eq!(wait_for_rows(&h.history, "btc", 1).await, 1);

        let again = h.tracker.get_price_history("btc", u32::MAX).await.unwrap();
        assert_eq!(h.provider.series_calls(), 1);
        assert_eq!(again.data.len(), 1);
    }

    #[test]
    fn days_before_saturates_at_earliest_instant() {
        let now = ManualClock::default().now();
        assert_eq!(days_before(now, 7), now - ChronoDuration::days(7));
        assert_eq!(days_before(now, 100_000_000), DateTime::<Utc>::MIN_UTC);
        assert_eq!(days_before(now, u32::MAX), DateTime::<Utc>::MIN_UTC);
    }

    /// Makes every insert into `price_history` fail while reads keep working
    async fn reject_history_inserts(history: &HistoryStore) {
        sqlx::query(
            "CREATE TRIGGER reject_history_inserts BEFORE INSERT ON price_history \
             BEGIN SELECT RAISE(ABORT, 'history is read-only'); END;",
        )
        .execute(history.pool())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn failed_backfill_writes_are_swallowed() {
        let h = harness().await;
        reject_history_inserts(&h.history).await;

        let now = h.clock.now();
        let series: Vec<PricePoint> = (1..=2)
            .map(|i| PricePoint {
                timestamp: (now - ChronoDuration::hours(i)).timestamp_millis(),
                price: 3000.0 + i as f64,
            })
            .collect();
        h.provider.set_series("ethereum", series.clone());

        let history = h.tracker.get_price_history("eth", 3).await.unwrap();
        assert_eq!(history.data, series);

        assert_eq!(backfill(&h.history, "eth", &series).await, 0);
        assert!(h.history.recent("eth", None).await.unwrap().is_empty());

        // Nothing was stored, so the next call goes remote again
        let again = h.tracker.get_price_history("eth", 3).await.unwrap();
        assert_eq!(again.data, series);
        assert_eq!(h.provider.series_calls(), 2);
    }

    #[tokio::test]
    async fn backfill_skips_unrepresentable_timestamps() {
        let h = harness().await;
        let points = vec![
            PricePoint {
                timestamp: i64::MAX,
                price: 1.0,
            },
            PricePoint {
                timestamp: h.clock.now().timestamp_millis(),
                price: 2.0,
            },
        ];

        assert_eq!(backfill(&h.history, "btc", &points).await, 1);
        let rows = h.history.recent("btc", None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].price, 2.0);
    }

    #[tokio::test]
    async fn remote_history_failure_is_reported() {
        let h = harness().await;
        h.provider.set_series_error("cardano", "HTTP 404: not found");

        let err = h.tracker.get_price_history("ada", 7).await.unwrap_err();
        assert!(
            matches!(err, PriceError::PriceHistoryFetchFailed { ref symbol, .. } if symbol == "ada")
        );
    }

    #[tokio::test]
    async fn zero_days_is_rejected() {
        let h = harness().await;
        let err = h.tracker.get_price_history("btc", 0).await.unwrap_err();
        assert!(matches!(err, PriceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn pagination_bounds_are_validated() {
        let h = harness().await;
        for (page, per_page) in [(1, 0), (1, 251), (0, 50)] {
            let err = h
                .tracker
                .list_cryptocurrencies(page, per_page)
                .await
                .unwrap_err();
            assert!(matches!(err, PriceError::InvalidInput(_)));
        }
        assert_eq!(h.provider.market_calls(), 0);

        assert!(h.tracker.list_cryptocurrencies(1, 250).await.is_ok());
        assert_eq!(h.provider.market_calls(), 1);
    }

    #[tokio::test]
    async fn retryable_errors_are_retried() {
        let h = harness().await;
        let calls = std::sync::atomic::AtomicUsize::new(0);

        let result: Result<u32, ProviderError> = h
            .tracker
            .call_provider("test", || {
                let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ProviderError::RateLimitExceeded)
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_stop_at_max_attempts() {
        let h = harness().await;
        let calls = std::sync::atomic::AtomicUsize::new(0);

        let result: Result<u32, ProviderError> = h
            .tracker
            .call_provider("test", || {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async { Err(ProviderError::Timeout) }
            })
            .await;

        assert!(matches!(result, Err(ProviderError::Timeout)));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn purge_uses_clock() {
        let h = harness().await;
        let now = h.clock.now();
        for days_ago in [1, 20, 40] {
            h.history
                .save(&HistoryRecord::new(
                    "btc",
                    1.0,
                    now - ChronoDuration::days(days_ago),
                ))
                .await
                .unwrap();
        }

        let removed = h.tracker.purge_history(30).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(h.history.recent("btc", Some(10)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn huge_retention_keeps_everything() {
        let h = harness().await;
        let now = h.clock.now();
        h.history
            .save(&HistoryRecord::new("btc", 1.0, now - ChronoDuration::days(365)))
            .await
            .unwrap();

        assert_eq!(h.tracker.purge_history(u32::MAX).await.unwrap(), 0);
        assert_eq!(h.history.recent("btc", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn health_reflects_provider_failures() {
        let h = harness().await;
        assert_eq!(h.tracker.health_check().await.status, HealthStatus::Healthy);

        h.provider.set_price_error("bitcoin", "HTTP 500");
        let _ = h.tracker.get_current_price("btc").await;
        assert_eq!(h.tracker.health_check().await.status, HealthStatus::Unhealthy);

        h.provider.set_price("bitcoin", "btc", 1.0);
        h.tracker.get_current_price("btc").await.unwrap();
        let health = h.tracker.health_check().await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.details["cache_entries"], serde_json::json!(1));
    }
}
