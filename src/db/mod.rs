//! SQLite persistence: connection pool, schema bootstrap and the two stores

pub mod favorites;
pub mod history;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::error::StoreError;

pub use favorites::FavoriteStore;
pub use history::HistoryStore;

/// Owns the connection pool and hands out store handles
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database at `database_url` and ensures the schema
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every connection to `:memory:` is a separate database
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        if !in_memory {
            if let Some(dir) = options.get_filename().parent() {
                if !dir.as_os_str().is_empty() {
                    std::fs::create_dir_all(dir).map_err(|e| StoreError::Database(e.into()))?;
                }
            }
        }

        let pool = pool_options(in_memory).connect_with(options).await?;

        let db = Self { pool };
        db.init_schema().await?;
        tracing::info!(url = %database_url, "Database ready");
        Ok(db)
    }

    /// Creates tables manually instead of running migrations
    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                price REAL NOT NULL,
                timestamp INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_price_history_symbol_ts ON price_history(symbol, timestamp);",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS favorites (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub fn history(&self) -> HistoryStore {
        HistoryStore::new(self.pool.clone())
    }

    pub fn favorites(&self) -> FavoriteStore {
        FavoriteStore::new(self.pool.clone())
    }
}

/// The in-memory database lives only as long as its single connection,
/// so that connection is never reaped.
fn pool_options(in_memory: bool) -> SqlitePoolOptions {
    if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    }
}

/// Timestamps are stored as epoch milliseconds
pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        StoreError::Database(sqlx::Error::Decode(
            format!("timestamp out of range: {ms}").into(),
        ))
    })
}

#[cfg(test)]
pub(crate) async fn test_db() -> Database {
    Database::connect("sqlite::memory:")
        .await
        .expect("in-memory database")
}
