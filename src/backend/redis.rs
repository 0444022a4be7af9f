//! Redis cache backend over a caller-supplied connection.

use crate::error::{Error, Result};
use crate::provider::CacheProvider;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::fmt;
use std::time::Duration;

/// Configuration for the Redis backend.
///
/// The connection is owned by the caller: the factory never opens or
/// closes Redis connections itself, it only validates that one was
/// supplied.
#[derive(Clone, Default)]
pub struct RedisConfig {
    /// Live connection handle. Required.
    pub client: Option<ConnectionManager>,
    /// Prefix prepended to every key for namespacing.
    pub key_prefix: Option<String>,
    /// TTL applied to entries stored without a per-call TTL. `None`
    /// means such entries never expire.
    pub default_ttl: Option<Duration>,
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("client", &self.client.as_ref().map(|_| "<ConnectionManager>"))
            .field("key_prefix", &self.key_prefix)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl RedisConfig {
    pub fn new(client: ConnectionManager) -> Self {
        RedisConfig {
            client: Some(client),
            ..Default::default()
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }
}

/// Redis adapter. TTLs map to `SET ... EX`; entries without a TTL are
/// stored with plain `SET`.
#[derive(Clone)]
pub struct RedisProvider {
    connection: ConnectionManager,
    key_prefix: Option<String>,
    default_ttl: Option<Duration>,
}

impl RedisProvider {
    /// # Errors
    /// Returns `Error::InvalidConfig` naming `redis.client` if no
    /// connection handle was supplied.
    pub fn new(config: RedisConfig) -> Result<Self> {
        let connection = config.client.ok_or_else(|| {
            Error::invalid_config(
                "redis.client",
                "an instance of redis::aio::ConnectionManager",
            )
        })?;

        info!("redis cache backend initialized");
        Ok(RedisProvider {
            connection,
            key_prefix: config.key_prefix,
            default_ttl: config.default_ttl,
        })
    }

    fn prefixed(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }

}

/// Per-call TTL, falling back to the configured default.
fn effective_ttl(per_call: Option<Duration>, default: Option<Duration>) -> Option<Duration> {
    per_call.or(default)
}

#[async_trait]
impl CacheProvider for RedisProvider {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection.clone();
        let value: Option<Vec<u8>> = conn
            .get(self.prefixed(key))
            .await
            .map_err(|e| Error::BackendError(format!("redis GET failed for key {}: {}", key, e)))?;

        debug!(
            "redis GET {} -> {}",
            key,
            if value.is_some() { "hit" } else { "miss" }
        );
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.connection.clone();
        let prefixed = self.prefixed(key);
        let ttl = effective_ttl(ttl, self.default_ttl);

        match ttl {
            Some(d) => {
                // Redis EX takes whole seconds; round sub-second TTLs up.
                let secs = d.as_secs().max(1);
                let _: () = conn.set_ex(prefixed, value, secs).await.map_err(|e| {
                    Error::BackendError(format!("redis SETEX failed for key {}: {}", key, e))
                })?;
            }
            None => {
                let _: () = conn.set(prefixed, value).await.map_err(|e| {
                    Error::BackendError(format!("redis SET failed for key {}: {}", key, e))
                })?;
            }
        }

        debug!("redis SET {} (ttl: {:?})", key, ttl);
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let exists: bool = conn.exists(self.prefixed(key)).await.map_err(|e| {
            Error::BackendError(format!("redis EXISTS failed for key {}: {}", key, e))
        })?;
        Ok(exists)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(self.prefixed(key)).await.map_err(|e| {
            Error::BackendError(format!("redis DEL failed for key {}: {}", key, e))
        })?;

        debug!("redis DELETE {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_carries_default_ttl() {
        let config = RedisConfig::default()
            .with_key_prefix("app")
            .with_default_ttl(Duration::from_secs(600));
        assert_eq!(config.default_ttl, Some(Duration::from_secs(600)));
        assert_eq!(config.key_prefix.as_deref(), Some("app"));
    }

    #[test]
    fn test_default_ttl_fills_in_for_untimed_sets() {
        let default = Some(Duration::from_secs(600));
        // No per-call TTL: the configured default applies.
        assert_eq!(effective_ttl(None, default), default);
        // A per-call TTL wins over the default.
        assert_eq!(
            effective_ttl(Some(Duration::from_secs(5)), default),
            Some(Duration::from_secs(5))
        );
        // Neither configured: the entry never expires.
        assert_eq!(effective_ttl(None, None), None);
    }

    #[test]
    fn test_missing_client_is_invalid_config() {
        let err = RedisProvider::new(RedisConfig::default()).unwrap_err();
        match err {
            Error::InvalidConfig { key, expected } => {
                assert_eq!(key, "redis.client");
                assert!(expected.contains("ConnectionManager"));
            }
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }
}
