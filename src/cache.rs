//! In-memory price cache with time-based expiry

use crate::{clock::Clock, constants::CACHE_TTL_MS, types::PriceSnapshot};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A cached snapshot and the moment it was stored
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub snapshot: PriceSnapshot,
    pub fetched_at_epoch_ms: i64,
}

impl CacheEntry {
    /// Whether the entry is still within `ttl_ms` of `now_ms`
    pub fn is_fresh(&self, now_ms: i64, ttl_ms: i64) -> bool {
        now_ms - self.fetched_at_epoch_ms < ttl_ms
    }
}

/// In-memory store for price snapshots, keyed by lowercase symbol
///
/// Entries are never evicted; expired ones are simply ignored on read and
/// replaced by the next `put`.
pub struct PriceCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
    ttl_ms: i64,
}

impl PriceCache {
    /// Creates a cache with the default 60 second lifetime
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, CACHE_TTL_MS)
    }

    pub fn with_ttl(clock: Arc<dyn Clock>, ttl_ms: i64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            ttl_ms,
        }
    }

    /// Returns the snapshot for `symbol` if one was stored less than the TTL ago
    pub async fn get(&self, symbol: &str) -> Option<PriceSnapshot> {
        let now_ms = self.clock.now_millis();
        let entries = self.entries.read().await;
        entries
            .get(&symbol.to_lowercase())
            .filter(|entry| entry.is_fresh(now_ms, self.ttl_ms))
            .map(|entry| entry.snapshot.clone())
    }

    /// Stores `snapshot` for `symbol`, replacing any previous entry
    pub async fn put(&self, symbol: &str, snapshot: PriceSnapshot) {
        let entry = CacheEntry {
            snapshot,
            fetched_at_epoch_ms: self.clock.now_millis(),
        };
        let key = symbol.to_lowercase();
        tracing::debug!(symbol = %key, price_usd = entry.snapshot.price_usd(), "Cached price");
        self.entries.write().await.insert(key, entry);
    }

    /// Number of entries held, fresh or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
