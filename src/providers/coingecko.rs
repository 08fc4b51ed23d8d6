//! CoinGecko market data provider implementation

use crate::{
    constants::{COINGECKO_API_KEY_HEADER, COINGECKO_API_URL, REQUEST_TIMEOUT_SECS, USER_AGENT},
    error::ProviderError,
    provider::MarketDataProvider,
    types::{CurrencyPrices, MarketCoin, PricePoint, PriceSnapshot},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// CoinGecko `/coins/{id}` response (only the fields we use)
#[derive(Debug, Deserialize)]
struct CoinDetailResponse {
    id: String,
    symbol: String,
    name: String,
    #[serde(default)]
    image: Option<CoinImage>,
    market_data: MarketData,
}

#[derive(Debug, Deserialize)]
struct CoinImage {
    large: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MarketData {
    current_price: FiatValues,
    #[serde(default)]
    market_cap: Option<FiatValues>,
    price_change_percentage_24h: Option<f64>,
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct FiatValues {
    usd: Option<f64>,
    eur: Option<f64>,
    gbp: Option<f64>,
}

/// CoinGecko `/coins/{id}/market_chart` response
#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    prices: Vec<(f64, f64)>,
}

/// CoinGecko price provider
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
}

impl CoinGeckoProvider {
    /// Creates a provider against `base_url`, authenticating when `api_key` is set
    pub fn new(base_url: &str, api_key: Option<&str>) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(key).map_err(|_| {
                ProviderError::InvalidResponse("API key is not a valid header value".to_string())
            })?;
            headers.insert(COINGECKO_API_KEY_HEADER, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(ProviderError::NetworkError)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Public tier, no API key
    pub fn public() -> Result<Self, ProviderError> {
        Self::new(COINGECKO_API_URL, None)
    }

    /// Issues a GET and decodes the JSON body, classifying failures
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Requesting CoinGecko");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(classify_transport_error)?;

        // Check for rate limiting
        if response.status().as_u16() == 429 {
            return Err(ProviderError::RateLimitExceeded);
        }

        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let body = response.text().await.map_err(classify_transport_error)?;

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "Failed to parse CoinGecko response from {}: {}",
                path, e
            ))
        })
    }
}

fn classify_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::NetworkError(e)
    }
}

/// Turns a coin detail payload into a snapshot; a missing USD price is malformed
fn parse_coin_detail(response: CoinDetailResponse) -> Result<PriceSnapshot, ProviderError> {
    let md = response.market_data;
    let usd = md.current_price.usd.ok_or_else(|| {
        ProviderError::InvalidResponse(format!("No USD price for {}", response.id))
    })?;

    Ok(PriceSnapshot {
        coin_id: response.id,
        symbol: response.symbol,
        name: response.name,
        image_url: response.image.and_then(|i| i.large),
        price_by_currency: CurrencyPrices {
            usd,
            eur: md.current_price.eur,
            gbp: md.current_price.gbp,
        },
        market_cap_usd: md.market_cap.and_then(|m| m.usd),
        price_change_24h_pct: md.price_change_percentage_24h,
        last_updated: md.last_updated,
    })
}

fn parse_market_chart(response: MarketChartResponse) -> Vec<PricePoint> {
    response
        .prices
        .into_iter()
        .map(|(ts, price)| PricePoint {
            timestamp: ts as i64,
            price,
        })
        .collect()
}

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    async fn fetch_snapshot(&self, coin_id: &str) -> Result<PriceSnapshot, ProviderError> {
        let query = [
            ("localization", "false".to_string()),
            ("tickers", "false".to_string()),
            ("market_data", "true".to_string()),
            ("community_data", "false".to_string()),
            ("developer_data", "false".to_string()),
        ];
        let detail: CoinDetailResponse = self
            .get_json(&format!("/coins/{}", coin_id), &query)
            .await?;
        parse_coin_detail(detail)
    }

    async fn fetch_price_series(
        &self,
        coin_id: &str,
        days: u32,
    ) -> Result<Vec<PricePoint>, ProviderError> {
        let query = [
            ("vs_currency", "usd".to_string()),
            ("days", days.to_string()),
        ];
        let chart: MarketChartResponse = self
            .get_json(&format!("/coins/{}/market_chart", coin_id), &query)
            .await?;

        let points = parse_market_chart(chart);
        tracing::debug!(coin_id, days, count = points.len(), "Fetched price series");
        Ok(points)
    }

    async fn fetch_markets(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<MarketCoin>, ProviderError> {
        let query = [
            ("vs_currency", "usd".to_string()),
            ("order", "market_cap_desc".to_string()),
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
            ("sparkline", "false".to_string()),
        ];
        self.get_json("/coins/markets", &query).await
    }

    fn provider_name(&self) -> &'static str {
        "coingecko"
    }
}
