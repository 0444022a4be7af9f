//! The common cache-provider capability.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Capability every backend adapter implements.
///
/// Object safe by design: the factory memoizes heterogeneous backends as
/// `Arc<dyn CacheProvider>` in a single table. Values are opaque byte
/// strings; callers layer their own serialization on top.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Fetch the value stored under `key`, or `None` if absent or
    /// expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`. `ttl` of `None` means the entry never
    /// expires (subject to the backend's own eviction, if any).
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Whether a live (non-expired) entry exists under `key`.
    async fn contains(&self, key: &str) -> Result<bool>;

    /// Remove the entry under `key`. Removing an absent key is not an
    /// error.
    async fn delete(&self, key: &str) -> Result<()>;
}

impl std::fmt::Debug for dyn CacheProvider + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn CacheProvider")
    }
}
