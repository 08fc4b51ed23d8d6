//! Types for the price tracker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Spot prices in the fiat currencies the tracker reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyPrices {
    pub usd: f64,
    pub eur: Option<f64>,
    pub gbp: Option<f64>,
}

/// Point-in-time market data for a single coin
///
/// Only ever built from a successful remote fetch and never modified after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// Remote source identifier (e.g. "bitcoin")
    #[serde(rename = "id")]
    pub coin_id: String,

    /// Ticker as reported by the remote source
    pub symbol: String,

    pub name: String,

    #[serde(rename = "image")]
    pub image_url: Option<String>,

    #[serde(rename = "current_price")]
    pub price_by_currency: CurrencyPrices,

    #[serde(rename = "market_cap")]
    pub market_cap_usd: Option<f64>,

    #[serde(rename = "price_change_24h")]
    pub price_change_24h_pct: Option<f64>,

    pub last_updated: Option<DateTime<Utc>>,
}

impl PriceSnapshot {
    /// Price in USD, the currency history is recorded in
    pub fn price_usd(&self) -> f64 {
        self.price_by_currency.usd
    }
}

/// One observed price, as persisted in the history table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Assigned by the store on insert
    pub id: Option<i64>,
    /// Lowercase symbol
    pub symbol: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl HistoryRecord {
    /// Creates an unsaved record, lowercasing the symbol
    pub fn new(symbol: &str, price: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: None,
            symbol: symbol.to_lowercase(),
            price,
            timestamp,
        }
    }
}

/// A single `(epoch ms, price)` pair as returned to callers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: i64,
    pub price: f64,
}

impl From<&HistoryRecord> for PricePoint {
    fn from(record: &HistoryRecord) -> Self {
        Self {
            timestamp: record.timestamp.timestamp_millis(),
            price: record.price,
        }
    }
}

/// Price series for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub symbol: String,
    pub data: Vec<PricePoint>,
}

/// A row of the paginated market listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCoin {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub image: Option<String>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_rank: Option<u32>,
    pub price_change_percentage_24h: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// A coin the user has marked as a favorite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteRecord {
    pub id: i64,
    pub symbol: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Overall system health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// All components are operational
    Healthy,
    /// Still serving, but the remote source is failing often
    Degraded,
    /// The remote source has not answered a single recent request
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub details: std::collections::HashMap<String, serde_json::Value>,
    pub last_checked: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn snapshot_serializes_with_wire_names() {
        let snapshot = PriceSnapshot {
            coin_id: "bitcoin".to_string(),
            symbol: "btc".to_string(),
            name: "Bitcoin".to_string(),
            image_url: Some("https://example.com/btc.png".to_string()),
            price_by_currency: CurrencyPrices {
                usd: 65000.0,
                eur: Some(60000.0),
                gbp: None,
            },
            market_cap_usd: Some(1.2e12),
            price_change_24h_pct: Some(-1.5),
            last_updated: None,
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["id"], "bitcoin");
        assert_eq!(json["image"], "https://example.com/btc.png");
        assert_eq!(json["current_price"]["usd"], 65000.0);
        assert_eq!(json["market_cap"], 1.2e12);
        assert_eq!(json["price_change_24h"], -1.5);
        assert!(json.get("coin_id").is_none());
    }

    #[test]
    fn history_record_lowercases_symbol() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let record = HistoryRecord::new("ETH", 3100.0, ts);
        assert_eq!(record.symbol, "eth");
        assert!(record.id.is_none());

        let point = PricePoint::from(&record);
        assert_eq!(point.timestamp, ts.timestamp_millis());
        assert_eq!(point.price, 3100.0);
    }
}
