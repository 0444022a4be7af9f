//! Memcached cache backend over a caller-supplied connection pool.

use crate::error::{Error, Result};
use crate::provider::CacheProvider;
use async_memcached::AsciiProtocol;
use async_trait::async_trait;
use deadpool_memcached::Pool;
use std::fmt;
use std::time::Duration;

/// Configuration for the Memcached backend.
///
/// The pool is owned by the caller; the factory only validates that one
/// was supplied.
#[derive(Clone, Default)]
pub struct MemcachedConfig {
    /// Live connection pool. Required.
    pub pool: Option<Pool>,
}

impl fmt::Debug for MemcachedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemcachedConfig")
            .field("pool", &self.pool.as_ref().map(|_| "<Pool>"))
            .finish()
    }
}

impl MemcachedConfig {
    pub fn new(pool: Pool) -> Self {
        MemcachedConfig { pool: Some(pool) }
    }
}

/// Memcached adapter speaking the ASCII protocol through a deadpool
/// connection pool.
#[derive(Clone)]
pub struct MemcachedProvider {
    pool: Pool,
}

impl MemcachedProvider {
    /// # Errors
    /// Returns `Error::InvalidConfig` naming `memcached.pool` if no pool
    /// was supplied.
    pub fn new(config: MemcachedConfig) -> Result<Self> {
        let pool = config.pool.ok_or_else(|| {
            Error::invalid_config("memcached.pool", "an instance of deadpool_memcached::Pool")
        })?;

        info!("memcached cache backend initialized");
        Ok(MemcachedProvider { pool })
    }
}

#[async_trait]
impl CacheProvider for MemcachedProvider {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.pool.get().await.map_err(|e| {
            Error::BackendError(format!("failed to get memcached connection: {}", e))
        })?;

        match conn.get(key).await {
            Ok(Some(value)) => {
                debug!("memcached GET {} -> hit", key);
                Ok(value.data)
            }
            Ok(None) => {
                debug!("memcached GET {} -> miss", key);
                Ok(None)
            }
            Err(e) => Err(Error::BackendError(format!(
                "memcached GET failed for key {}: {}",
                key, e
            ))),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(|e| {
            Error::BackendError(format!("failed to get memcached connection: {}", e))
        })?;

        let expiration = ttl.map(expiration_for);

        conn.set(key, value.as_slice(), expiration, None)
            .await
            .map_err(|e| {
                Error::BackendError(format!("memcached SET failed for key {}: {}", key, e))
            })?;

        debug!("memcached SET {} (ttl: {:?})", key, ttl);
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        // No native EXISTS in the protocol; a GET stands in.
        let mut conn = self.pool.get().await.map_err(|e| {
            Error::BackendError(format!("failed to get memcached connection: {}", e))
        })?;
        match conn.get(key).await {
            Ok(Some(_)) => Ok(true),
            Ok(None) => Ok(false),
            Err(e) => Err(Error::BackendError(format!(
                "memcached EXISTS check failed for key {}: {}",
                key, e
            ))),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(|e| {
            Error::BackendError(format!("failed to get memcached connection: {}", e))
        })?;

        match conn.delete(key).await {
            Ok(()) => {}
            Err(e) => {
                // DELETE of an absent key reports "not found"; that is
                // success under the provider contract.
                let msg = e.to_string();
                if !msg.contains("not found") {
                    return Err(Error::BackendError(format!(
                        "memcached DELETE failed for key {}: {}",
                        key, e
                    )));
                }
            }
        }

        debug!("memcached DELETE {}", key);
        Ok(())
    }
}

/// Expiration values below 30 days are relative seconds; anything
/// larger memcached reads as an absolute Unix timestamp.
const RELATIVE_TTL_MAX_SECS: u64 = 2_592_000;

/// Map a TTL to the wire expiration field, converting durations at or
/// past the 30-day boundary into absolute timestamps so they are not
/// misread as moments in the past.
fn expiration_for(ttl: Duration) -> i64 {
    let secs = ttl.as_secs().max(1);
    if secs < RELATIVE_TTL_MAX_SECS {
        secs as i64
    } else {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        now.saturating_add(secs) as i64
    }
}
