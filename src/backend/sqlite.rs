//! SQLite cache backend over a caller-supplied connection pool.

use crate::error::{Error, Result};
use crate::provider::CacheProvider;
use crate::serialization::{decode_entry, encode_entry, StoredEntry};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::time::Duration;

const DEFAULT_TABLE: &str = "cache_entries";

/// Configuration for the SQLite backend.
///
/// The pool is owned by the caller; the factory validates it was
/// supplied and that the table name is a plain identifier.
#[derive(Clone, Debug)]
pub struct SqliteConfig {
    /// Live connection pool. Required.
    pub pool: Option<SqlitePool>,
    /// Table entries are stored in. Created if absent.
    pub table: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        SqliteConfig {
            pool: None,
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

impl SqliteConfig {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteConfig {
            pool: Some(pool),
            ..Default::default()
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }
}

/// SQLite adapter storing each entry as a row holding the versioned
/// envelope, so expiry survives restarts without a schema for it.
#[derive(Clone)]
pub struct SqliteProvider {
    pool: SqlitePool,
    table: String,
}

impl SqliteProvider {
    /// Validate the config and ensure the entries table exists.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` naming `sqlite.pool` if no pool was
    ///   supplied, or naming `sqlite.table` if the table name is not a
    ///   plain identifier.
    /// - `Error::BackendError` if the table cannot be created.
    pub async fn new(config: SqliteConfig) -> Result<Self> {
        let pool = config.pool.ok_or_else(|| {
            Error::invalid_config("sqlite.pool", "an instance of sqlx::SqlitePool")
        })?;

        // The table name is interpolated into SQL, so it must be a bare
        // identifier.
        if config.table.is_empty()
            || !config
                .table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(Error::invalid_config(
                "sqlite.table",
                "a table name containing only ASCII letters, digits and underscores",
            ));
        }

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (k TEXT PRIMARY KEY, v BLOB NOT NULL)",
            config.table
        ))
        .execute(&pool)
        .await
        .map_err(|e| {
            Error::BackendError(format!(
                "failed to create cache table {}: {}",
                config.table, e
            ))
        })?;

        info!("sqlite cache backend initialized (table: {})", config.table);
        Ok(SqliteProvider {
            pool,
            table: config.table,
        })
    }

    async fn read_entry(&self, key: &str) -> Result<Option<StoredEntry>> {
        let row = sqlx::query(&format!("SELECT v FROM {} WHERE k = ?1", self.table))
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::BackendError(format!("sqlite SELECT failed for key {}: {}", key, e))
            })?;

        let Some(row) = row else {
            return Ok(None);
        };

        let bytes: Vec<u8> = row.try_get(0).map_err(|e| {
            Error::BackendError(format!("sqlite row decode failed for key {}: {}", key, e))
        })?;

        let entry = decode_entry(&bytes)?;
        if entry.is_expired() {
            debug!("sqlite GET {} -> expired", key);
            self.delete(key).await?;
            return Ok(None);
        }
        Ok(Some(entry))
    }
}

#[async_trait]
impl CacheProvider for SqliteProvider {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.read_entry(key).await? {
            Some(entry) => {
                debug!("sqlite GET {} -> hit", key);
                Ok(Some(entry.data))
            }
            None => {
                debug!("sqlite GET {} -> miss", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let bytes = encode_entry(&StoredEntry::new(value, ttl))?;

        sqlx::query(&format!(
            "INSERT INTO {} (k, v) VALUES (?1, ?2) ON CONFLICT(k) DO UPDATE SET v = excluded.v",
            self.table
        ))
        .bind(key)
        .bind(bytes)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::BackendError(format!("sqlite UPSERT failed for key {}: {}", key, e)))?;

        debug!("sqlite SET {} (ttl: {:?})", key, ttl);
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.read_entry(key).await?.is_some())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query(&format!("DELETE FROM {} WHERE k = ?1", self.table))
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::BackendError(format!("sqlite DELETE failed for key {}: {}", key, e))
            })?;

        debug!("sqlite DELETE {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One connection only: each sqlite::memory: connection is its own
    // database, so a larger pool would scatter the table.
    async fn memory_pool() -> SqlitePool {
        sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_pool_is_invalid_config() {
        let err = SqliteProvider::new(SqliteConfig::default()).await.unwrap_err();
        match err {
            Error::InvalidConfig { key, expected } => {
                assert_eq!(key, "sqlite.pool");
                assert!(expected.contains("SqlitePool"));
            }
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejects_hostile_table_name() {
        let config = SqliteConfig::new(memory_pool().await).with_table("x; DROP TABLE y");
        let err = SqliteProvider::new(config).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { key, .. } if key == "sqlite.table"));
    }

    #[tokio::test]
    async fn test_set_get_contains_delete() {
        let cache = SqliteProvider::new(SqliteConfig::new(memory_pool().await))
            .await
            .unwrap();

        cache.set("k", b"value".to_vec(), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"value".to_vec()));
        assert!(cache.contains("k").await.unwrap());

        cache.set("k", b"updated".to_vec(), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"updated".to_vec()));

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = SqliteProvider::new(SqliteConfig::new(memory_pool().await))
            .await
            .unwrap();

        cache
            .set("k", b"v".to_vec(), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.contains("k").await.unwrap());
    }
}
