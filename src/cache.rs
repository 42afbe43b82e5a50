//! Key-value cache with per-entry expiry.
//!
//! Entries are JSON text. The cache only accelerates upstream calls, so the
//! typed helpers [`get_json`] and [`set_json`] degrade to a miss or a no-op
//! when the backend misbehaves instead of failing the request.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::{PriceError, Result};

pub type SharedCache = Arc<dyn PriceCache>;

#[async_trait]
pub trait PriceCache: Send + Sync {
    /// Returns the stored value unless it is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;
}

/// Opens the backend named by `url`: `memory`, or a SQLite database URL.
pub async fn open_cache(url: &str) -> Result<SharedCache> {
    if url.eq_ignore_ascii_case("memory") {
        return Ok(Arc::new(MemoryCache::new()));
    }
    Ok(Arc::new(SqliteCache::connect(url).await?))
}

pub async fn get_json<T: DeserializeOwned>(cache: &dyn PriceCache, key: &str) -> Option<T> {
    match cache.get(key).await {
        Ok(Some(json)) => match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("Discarding undecodable cache entry {}: {}", key, err);
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            tracing::warn!("Cache read failed for {}: {}", key, err);
            None
        }
    }
}

pub async fn set_json<T: Serialize + ?Sized>(
    cache: &dyn PriceCache,
    key: &str,
    value: &T,
    ttl: Duration,
) {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(err) => {
            tracing::warn!("Failed to serialize cache entry {}: {}", key, err);
            return;
        }
    };
    if let Err(err) = cache.set(key, json, ttl).await {
        tracing::warn!("Cache write failed for {}: {}", key, err);
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PriceCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| Instant::now() < *expires_at)
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        entries.retain(|_, (_, expires_at)| now < *expires_at);
        entries.insert(key.to_string(), (value, now + ttl));
        Ok(())
    }
}

pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at ON cache_entries(expires_at);")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    /// Deletes expired rows and returns how many were removed.
    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl PriceCache for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM cache_entries WHERE key = ? AND expires_at > ?")
            .bind(key)
            .bind(chrono::Utc::now().timestamp())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get("value")))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let ttl_secs = i64::try_from(ttl.as_secs())
            .map_err(|_| PriceError::Cache(format!("ttl out of range for {}", key)))?;
        let expires_at = chrono::Utc::now().timestamp().saturating_add(ttl_secs);

        let purged = self.purge_expired().await?;
        if purged > 0 {
            tracing::debug!("Purged {} expired cache entries", purged);
        }

        sqlx::query("INSERT OR REPLACE INTO cache_entries (key, value, expires_at) VALUES (?, ?, ?)")
            .bind(key)
            .bind(value)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
