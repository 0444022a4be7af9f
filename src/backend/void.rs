//! No-op cache backend.

use crate::error::Result;
use crate::provider::CacheProvider;
use async_trait::async_trait;
use std::time::Duration;

/// Provider that stores nothing: every write succeeds, every read
/// misses. Useful for disabling caching without touching call sites.
#[derive(Debug, Default, Clone, Copy)]
pub struct VoidProvider;

impl VoidProvider {
    pub fn new() -> Self {
        VoidProvider
    }
}

#[async_trait]
impl CacheProvider for VoidProvider {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
        Ok(())
    }

    async fn contains(&self, _key: &str) -> Result<bool> {
        Ok(false)
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}
