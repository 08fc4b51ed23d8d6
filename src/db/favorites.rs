use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, sqlite::SqliteRow, Row};

use super::{from_millis, to_millis};
use crate::error::StoreError;
use crate::types::FavoriteRecord;

/// Favorites list backed by the `favorites` table (unique on symbol)
#[derive(Clone)]
pub struct FavoriteStore {
    pool: SqlitePool,
}

impl FavoriteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Adds a favorite, failing with `StoreError::Conflict` if the symbol is already present
    pub async fn add(
        &self,
        symbol: &str,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<FavoriteRecord, StoreError> {
        let symbol = symbol.to_lowercase();
        let result = sqlx::query("INSERT INTO favorites (symbol, name, created_at) VALUES (?, ?, ?)")
            .bind(&symbol)
            .bind(name)
            .bind(to_millis(created_at))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_insert(e, &symbol))?;

        Ok(FavoriteRecord {
            id: result.last_insert_rowid(),
            symbol,
            name: name.to_string(),
            created_at,
        })
    }

    /// Removes the favorite for `symbol`, returning how many rows went away (0 or 1)
    pub async fn remove(&self, symbol: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM favorites WHERE symbol = ?")
            .bind(symbol.to_lowercase())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// All favorites, most recently added first
    pub async fn list(&self) -> Result<Vec<FavoriteRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, symbol, name, created_at FROM favorites ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(favorite_from_row).collect()
    }

    pub async fn contains(&self, symbol: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM favorites WHERE symbol = ?")
            .bind(symbol.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }
}

fn favorite_from_row(row: &SqliteRow) -> Result<FavoriteRecord, StoreError> {
    Ok(FavoriteRecord {
        id: row.try_get("id")?,
        symbol: row.try_get("symbol")?,
        name: row.try_get("name")?,
        created_at: from_millis(row.try_get("created_at")?)?,
    })
}
