//! Error types for the price tracker

use thiserror::Error;

/// Errors that can occur when talking to the remote price source
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network request failed
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Response body could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Non-success status from the provider
    #[error("Provider API error: {0}")]
    ApiError(String),

    /// Timeout waiting for response
    #[error("Request timeout")]
    Timeout,
}

impl ProviderError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError(e) => !e.is_decode(),
            Self::RateLimitExceeded | Self::Timeout => true,
            Self::InvalidResponse(_) | Self::ApiError(_) => false,
        }
    }
}

/// Errors raised by the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique key already exists
    #[error("{0} is already in favorites")]
    Conflict(String),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Classifies a failed insert, turning unique violations into `Conflict`
    pub(crate) fn from_insert(err: sqlx::Error, key: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(key.to_string())
            }
            _ => Self::Database(err),
        }
    }
}

/// Errors returned by the price tracker
#[derive(Debug, Error)]
pub enum PriceError {
    /// Current price could not be fetched remotely
    #[error("Failed to fetch price data for {symbol}")]
    PriceFetchFailed {
        symbol: String,
        #[source]
        source: ProviderError,
    },

    /// Local history was empty and the remote series could not be fetched
    #[error("Failed to fetch price history for {symbol}")]
    PriceHistoryFetchFailed {
        symbol: String,
        #[source]
        source: ProviderError,
    },

    /// Market listing could not be fetched
    #[error("Failed to fetch cryptocurrencies list")]
    ListingFetchFailed(#[source] ProviderError),

    /// Caller supplied invalid input
    #[error("{0}")]
    InvalidInput(String),

    /// Local history could not be read
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PriceError {
    /// Creates a PriceFetchFailed error
    pub fn price_fetch_failed(symbol: &str, source: ProviderError) -> Self {
        Self::PriceFetchFailed {
            symbol: symbol.to_string(),
            source,
        }
    }

    /// Creates a PriceHistoryFetchFailed error
    pub fn history_fetch_failed(symbol: &str, source: ProviderError) -> Self {
        Self::PriceHistoryFetchFailed {
            symbol: symbol.to_string(),
            source,
        }
    }

    /// Creates an InvalidInput error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
