//! Constants for the price tracker
//!
//! Compile-time tuning lives here. Deployment-specific settings (bind address,
//! database location, API key) are read from the environment in `config`.

/// How long a cached price snapshot stays fresh (in milliseconds)
pub const CACHE_TTL_MS: i64 = 60_000;

/// HTTP request timeout when talking to the remote price source (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Maximum number of attempts for a single remote call
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Initial backoff delay for retries (in milliseconds)
pub const INITIAL_BACKOFF_MS: u64 = 500;

/// Maximum backoff delay for retries (in milliseconds)
pub const MAX_BACKOFF_MS: u64 = 8_000;

/// Number of days of history returned when the caller does not ask for a span
pub const DEFAULT_HISTORY_DAYS: u32 = 7;

/// Number of rows `HistoryStore::recent` returns when no limit is given
pub const DEFAULT_RECENT_LIMIT: u32 = 100;

/// Default page size for the market listing
pub const DEFAULT_PER_PAGE: u32 = 50;

/// Largest page size the market listing accepts
pub const MAX_PER_PAGE: u32 = 250;

/// How often the retention sweep runs when retention is enabled (in seconds)
pub const RETENTION_SWEEP_SECS: u64 = 3_600;

/// CoinGecko API base URL (public tier)
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Header carrying the CoinGecko API key
pub const COINGECKO_API_KEY_HEADER: &str = "x-cg-pro-api-key";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "crypto-price-tracker/0.1.0";
