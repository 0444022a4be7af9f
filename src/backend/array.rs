//! In-process array cache backend.

use crate::error::Result;
use crate::provider::CacheProvider;
use crate::serialization::StoredEntry;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;

/// Configuration for the in-process array backend. No field is required.
#[derive(Clone, Debug, Default)]
pub struct ArrayConfig {
    /// Pre-size the map for roughly this many entries.
    pub initial_capacity: Option<usize>,
}

impl ArrayConfig {
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = Some(capacity);
        self
    }
}

/// In-process cache over a concurrent map. Entries carry per-entry
/// expiry; expired entries read as absent and are removed lazily on
/// access. Nothing survives the process.
pub struct ArrayProvider {
    entries: DashMap<String, StoredEntry>,
}

impl ArrayProvider {
    pub fn new(config: ArrayConfig) -> Self {
        let entries = match config.initial_capacity {
            Some(capacity) => DashMap::with_capacity(capacity),
            None => DashMap::new(),
        };
        info!("array cache backend initialized");
        ArrayProvider { entries }
    }

    /// Look up `key`, dropping the entry if it has expired. Returns the
    /// live entry's data, if any.
    fn live_data(&self, key: &str) -> Option<Vec<u8>> {
        // The map guard must be released before remove(), so the
        // expired path falls through instead of removing in place.
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.is_expired() {
                    true
                } else {
                    return Some(entry.data.clone());
                }
            }
            None => return None,
        };

        if expired {
            self.entries.remove(key);
            debug!("array GET {} -> expired", key);
        }
        None
    }
}

#[async_trait]
impl CacheProvider for ArrayProvider {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.live_data(key) {
            Some(data) => {
                debug!("array GET {} -> hit", key);
                Ok(Some(data))
            }
            None => {
                debug!("array GET {} -> miss", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.entries
            .insert(key.to_string(), StoredEntry::new(value, ttl));
        debug!("array SET {} (ttl: {:?})", key, ttl);
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.live_data(key).is_some())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        debug!("array DELETE {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_contains_delete() {
        let cache = ArrayProvider::new(ArrayConfig::default());

        cache.set("k", b"value".to_vec(), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"value".to_vec()));
        assert!(cache.contains("k").await.unwrap());

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.contains("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_key_is_absent() {
        let cache = ArrayProvider::new(ArrayConfig::default());
        assert_eq!(cache.get("nope").await.unwrap(), None);
        assert!(!cache.contains("nope").await.unwrap());
        // Deleting an absent key is fine.
        cache.delete("nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = ArrayProvider::new(ArrayConfig::default());
        cache
            .set("k", b"v".to_vec(), Some(Duration::from_millis(10)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let cache = ArrayProvider::new(ArrayConfig::default().with_initial_capacity(8));
        cache.set("k", b"old".to_vec(), None).await.unwrap();
        cache.set("k", b"new".to_vec(), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"new".to_vec()));
    }
}
