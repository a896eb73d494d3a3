/*!
 * Persistent cache backend stored in the `translation_cache` table.
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use log::info;
use rusqlite::{OptionalExtension, params};
use std::time::Duration;

use super::CachedResults;
use super::backend::CacheBackend;
use crate::database::DatabaseConnection;

/// Cache backend sharing the queue database
#[derive(Clone)]
pub struct SqliteCacheBackend {
    db: DatabaseConnection,
}

impl SqliteCacheBackend {
    /// Create a backend on an initialized database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CacheBackend for SqliteCacheBackend {
    async fn get(&self, fingerprint: &str) -> Result<Option<CachedResults>> {
        let fingerprint = fingerprint.to_string();
        let now = Utc::now().timestamp();

        let payload: Option<String> = self
            .db
            .execute_async(move |conn| {
                let payload = conn
                    .query_row(
                        "SELECT payload FROM translation_cache WHERE fingerprint = ?1 AND expires_at > ?2",
                        params![fingerprint, now],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(payload)
            })
            .await?;

        payload
            .map(|p| serde_json::from_str(&p).context("Corrupt cache payload"))
            .transpose()
    }

    async fn set(&self, fingerprint: &str, results: &[Option<String>], lifetime: Duration) -> Result<()> {
        let fingerprint = fingerprint.to_string();
        let payload = serde_json::to_string(results)?;
        let now = Utc::now().timestamp();
        let expires_at = now.saturating_add(lifetime.as_secs().min(i64::MAX as u64) as i64);

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT OR REPLACE INTO translation_cache (fingerprint, payload, created_at, expires_at)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                    params![fingerprint, payload, now, expires_at],
                )?;
                Ok(())
            })
            .await
    }

    async fn flush(&self) -> Result<()> {
        let removed = self
            .db
            .execute_async(|conn| Ok(conn.execute("DELETE FROM translation_cache", [])?))
            .await?;
        info!("Flushed {} cache entries", removed);
        Ok(())
    }

    async fn entry_count(&self) -> Result<u64> {
        let now = Utc::now().timestamp();
        self.db
            .execute_async(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM translation_cache WHERE expires_at > ?1",
                    [now],
                    |row| row.get(0),
                )?;
                Ok(count.max(0) as u64)
            })
            .await
    }

    async fn approximate_size_bytes(&self) -> Result<u64> {
        self.db
            .execute_async(|conn| {
                let size: i64 = conn.query_row(
                    "SELECT COALESCE(SUM(LENGTH(fingerprint) + LENGTH(payload)), 0) FROM translation_cache",
                    [],
                    |row| row.get(0),
                )?;
                Ok(size.max(0) as u64)
            })
            .await
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now().timestamp();
        let removed = self
            .db
            .execute_async(move |conn| {
                Ok(conn.execute("DELETE FROM translation_cache WHERE expires_at <= ?1", [now])?)
            })
            .await?;
        if removed > 0 {
            info!("Purged {} expired cache entries", removed);
        }
        Ok(removed as u64)
    }
}
