use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, sqlite::SqliteRow, Row};

use super::{from_millis, to_millis};
use crate::constants::DEFAULT_RECENT_LIMIT;
use crate::error::StoreError;
use crate::types::HistoryRecord;

/// Append-only price history backed by the `price_history` table
#[derive(Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Inserts `record` and returns it with its assigned id.
    /// Duplicates (same symbol and timestamp) are allowed.
    pub async fn save(&self, record: &HistoryRecord) -> Result<HistoryRecord, StoreError> {
        let symbol = record.symbol.to_lowercase();
        let result = sqlx::query("INSERT INTO price_history (symbol, price, timestamp) VALUES (?, ?, ?)")
            .bind(&symbol)
            .bind(record.price)
            .bind(to_millis(record.timestamp))
            .execute(&self.pool)
            .await?;

        Ok(HistoryRecord {
            id: Some(result.last_insert_rowid()),
            symbol,
            price: record.price,
            timestamp: record.timestamp,
        })
    }

    /// Latest `limit` records for `symbol`, newest first
    ///
    /// `None` returns up to [`DEFAULT_RECENT_LIMIT`] rows.
    pub async fn recent(
        &self,
        symbol: &str,
        limit: Option<u32>,
    ) -> Result<Vec<HistoryRecord>, StoreError> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT);
        let rows = sqlx::query(
            r#"
            SELECT id, symbol, price, timestamp
            FROM price_history
            WHERE symbol = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(symbol.to_lowercase())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Records for `symbol` with `start <= timestamp <= end`, newest first
    pub async fn range(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, symbol, price, timestamp
            FROM price_history
            WHERE symbol = ? AND timestamp BETWEEN ? AND ?
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(symbol.to_lowercase())
        .bind(to_millis(start))
        .bind(to_millis(end))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Deletes every record strictly older than `cutoff`
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM price_history WHERE timestamp < ?")
            .bind(to_millis(cutoff))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn record_from_row(row: &SqliteRow) -> Result<HistoryRecord, StoreError> {
    Ok(HistoryRecord {
        id: Some(row.try_get("id")?),
        symbol: row.try_get("symbol")?,
        price: row.try_get("price")?,
        timestamp: from_millis(row.try_get("timestamp")?)?,
    })
}
