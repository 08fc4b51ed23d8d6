use std::env;

use crate::constants::COINGECKO_API_URL;

/// Runtime configuration derived from environment variables.
///
/// Blank values are treated the same as unset ones.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: String,
    pub port: u16,
    pub database_url: String,

    // ── Remote price source ────────────────────────────────────────
    pub coingecko_api_url: String,
    /// Sent as a header when present; otherwise the public tier is used.
    pub coingecko_api_key: Option<String>,

    // ── History retention ──────────────────────────────────────────
    /// Days of history to keep. `None` disables the retention sweep.
    pub history_retention_days: Option<u32>,
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_str(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_u16(name: &str, default: u16) -> u16 {
    env_opt(name)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_u32_opt(name: &str) -> Option<u32> {
    env_opt(name).and_then(|s| s.parse().ok()).filter(|d| *d > 0)
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            bind: env_str("BIND", "0.0.0.0"),
            port: env_u16("PORT", 3001),
            database_url: env_str(
                "DATABASE_URL",
                "sqlite://data/crypto_tracker.sqlite?mode=rwc",
            ),
            coingecko_api_url: env_str("COINGECKO_API_URL", COINGECKO_API_URL),
            coingecko_api_key: env_opt("COINGECKO_API_KEY"),
            history_retention_days: env_u32_opt("HISTORY_RETENTION_DAYS"),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3001,
            database_url: "sqlite::memory:".to_string(),
            coingecko_api_url: COINGECKO_API_URL.to_string(),
            coingecko_api_key: None,
            history_retention_days: None,
        }
    }
}
