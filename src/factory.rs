//! The memoizing cache-provider factory.

use crate::backend::{ArrayConfig, ArrayProvider, FilesystemConfig, FilesystemProvider, VoidProvider};
use crate::error::{Error, Result};
use crate::kind::BackendKind;
use crate::probe::{CapabilityProbe, RuntimeProbe};
use crate::provider::CacheProvider;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

#[cfg(feature = "memcached")]
use crate::backend::{MemcachedConfig, MemcachedProvider};
#[cfg(feature = "mongodb")]
use crate::backend::{MongodbConfig, MongodbProvider};
#[cfg(feature = "redis")]
use crate::backend::{RedisConfig, RedisProvider};
#[cfg(feature = "sqlite")]
use crate::backend::{SqliteConfig, SqliteProvider};

/// What the factory should produce: a backend kind with its typed
/// configuration, or an already-constructed provider to adopt as-is.
pub enum ProviderSpec {
    Array(ArrayConfig),
    Void,
    Filesystem(FilesystemConfig),
    #[cfg(feature = "redis")]
    Redis(RedisConfig),
    #[cfg(feature = "memcached")]
    Memcached(MemcachedConfig),
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteConfig),
    #[cfg(feature = "mongodb")]
    Mongodb(MongodbConfig),
    /// Adopt a pre-constructed provider unchanged.
    Instance(Arc<dyn CacheProvider>),
}

impl ProviderSpec {
    /// The backend kind this spec selects, or `None` for a
    /// pre-constructed instance.
    pub fn kind(&self) -> Option<BackendKind> {
        match self {
            ProviderSpec::Array(_) => Some(BackendKind::Array),
            ProviderSpec::Void => Some(BackendKind::Void),
            ProviderSpec::Filesystem(_) => Some(BackendKind::Filesystem),
            #[cfg(feature = "redis")]
            ProviderSpec::Redis(_) => Some(BackendKind::Redis),
            #[cfg(feature = "memcached")]
            ProviderSpec::Memcached(_) => Some(BackendKind::Memcached),
            #[cfg(feature = "sqlite")]
            ProviderSpec::Sqlite(_) => Some(BackendKind::Sqlite),
            #[cfg(feature = "mongodb")]
            ProviderSpec::Mongodb(_) => Some(BackendKind::Mongodb),
            ProviderSpec::Instance(_) => None,
        }
    }

    /// Build a spec for `kind` with its default configuration. Useful
    /// when the kind comes from a parsed keyword. Kinds whose cargo
    /// feature was not compiled in fail with `MissingDependency`;
    /// kinds requiring a live handle will fail later, at construction,
    /// with `InvalidConfig`, since defaults cannot conjure a connection.
    pub fn with_defaults(kind: BackendKind) -> Result<Self> {
        match kind {
            BackendKind::Array => Ok(ProviderSpec::Array(ArrayConfig::default())),
            BackendKind::Void => Ok(ProviderSpec::Void),
            BackendKind::Filesystem => Ok(ProviderSpec::Filesystem(FilesystemConfig::default())),
            #[cfg(feature = "redis")]
            BackendKind::Redis => Ok(ProviderSpec::Redis(RedisConfig::default())),
            #[cfg(feature = "memcached")]
            BackendKind::Memcached => Ok(ProviderSpec::Memcached(MemcachedConfig::default())),
            #[cfg(feature = "sqlite")]
            BackendKind::Sqlite => Ok(ProviderSpec::Sqlite(SqliteConfig::default())),
            #[cfg(feature = "mongodb")]
            BackendKind::Mongodb => Ok(ProviderSpec::Mongodb(MongodbConfig::default())),
            #[allow(unreachable_patterns)]
            other => Err(Error::missing_dependency(
                other.feature_name().unwrap_or(other.as_str()),
                other.as_str(),
            )),
        }
    }
}

impl fmt::Debug for ProviderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "ProviderSpec({})", kind),
            None => write!(f, "ProviderSpec(<instance>)"),
        }
    }
}

/// Factory that constructs cache providers and memoizes them by
/// identifier.
///
/// The memo contract is **first write wins**: once an identifier has an
/// instance, every later `create` for that identifier returns it and
/// silently ignores the new spec. Use [`CacheFactory::get`] to check
/// whether an identifier is already bound.
///
/// Instances are never torn down by the factory; the lifecycle of
/// underlying connections belongs to the caller.
pub struct CacheFactory {
    instances: DashMap<String, Arc<dyn CacheProvider>>,
    probe: Arc<dyn CapabilityProbe>,
    // Serializes first-time construction so concurrent create() calls
    // for one identifier cannot build duplicates. tokio's Mutex does
    // not poison, so a failed construction cannot wedge the factory.
    build_gate: Mutex<()>,
}

impl Default for CacheFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CacheFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheFactory")
            .field("instances", &self.instances.len())
            .finish()
    }
}

impl CacheFactory {
    /// Factory using the compile-time capability probe.
    pub fn new() -> Self {
        Self::with_probe(Arc::new(RuntimeProbe))
    }

    /// Factory with an injected capability probe. Tests use this to
    /// simulate environments missing a backend's dependency.
    pub fn with_probe(probe: Arc<dyn CapabilityProbe>) -> Self {
        CacheFactory {
            instances: DashMap::new(),
            probe,
            build_gate: Mutex::new(()),
        }
    }

    /// Return the provider bound to `id`, constructing it on first call.
    ///
    /// On a memo hit the stored instance is returned immediately and
    /// `spec` is ignored, including its validation. On a miss the spec
    /// is validated and constructed; failure leaves `id` unbound, so a
    /// corrected call may still succeed.
    ///
    /// # Errors
    /// - `Error::InvalidArgument` for an empty `id`.
    /// - `Error::MissingDependency` if the capability probe reports the
    ///   chosen backend unavailable.
    /// - `Error::InvalidConfig` if the backend's required handle or
    ///   fields are missing or malformed.
    /// - `Error::BackendError` if the underlying crate fails during
    ///   construction.
    pub async fn create(&self, id: &str, spec: ProviderSpec) -> Result<Arc<dyn CacheProvider>> {
        if id.is_empty() {
            return Err(Error::InvalidArgument(
                "cache instance id must be a non-empty string".to_string(),
            ));
        }

        // Fast path: repeat calls never take the gate.
        if let Some(existing) = self.instances.get(id) {
            debug!("cache factory: reusing instance {}", id);
            return Ok(existing.clone());
        }

        let _gate = self.build_gate.lock().await;

        // Re-check under the gate: another task may have built this id
        // while we waited.
        if let Some(existing) = self.instances.get(id) {
            debug!("cache factory: reusing instance {}", id);
            return Ok(existing.clone());
        }

        let provider = self.construct(spec).await?;
        self.instances.insert(id.to_string(), provider.clone());
        info!("cache factory: constructed instance {}", id);
        Ok(provider)
    }

    /// The provider bound to `id`, if any. Never constructs.
    pub fn get(&self, id: &str) -> Option<Arc<dyn CacheProvider>> {
        self.instances.get(id).map(|entry| entry.clone())
    }

    /// Number of memoized instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn ensure_available(&self, kind: BackendKind) -> Result<()> {
        if self.probe.is_available(kind) {
            Ok(())
        } else {
            Err(Error::missing_dependency(
                kind.feature_name().unwrap_or(kind.as_str()),
                kind.as_str(),
            ))
        }
    }

    async fn construct(&self, spec: ProviderSpec) -> Result<Arc<dyn CacheProvider>> {
        if let Some(kind) = spec.kind() {
            self.ensure_available(kind)?;
        }

        match spec {
            ProviderSpec::Instance(provider) => Ok(provider),
            ProviderSpec::Array(config) => Ok(Arc::new(ArrayProvider::new(config))),
            ProviderSpec::Void => Ok(Arc::new(VoidProvider::new())),
            ProviderSpec::Filesystem(config) => Ok(Arc::new(FilesystemProvider::new(config)?)),
            #[cfg(feature = "redis")]
            ProviderSpec::Redis(config) => Ok(Arc::new(RedisProvider::new(config)?)),
            #[cfg(feature = "memcached")]
            ProviderSpec::Memcached(config) => Ok(Arc::new(MemcachedProvider::new(config)?)),
            #[cfg(feature = "sqlite")]
            ProviderSpec::Sqlite(config) => Ok(Arc::new(SqliteProvider::new(config).await?)),
            #[cfg(feature = "mongodb")]
            ProviderSpec::Mongodb(config) => Ok(Arc::new(MongodbProvider::new(config)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::StaticProbe;

    // Route factory debug! output through the test harness; safe to
    // call from every test, first caller wins.
    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[tokio::test]
    async fn test_create_constructs_and_memoizes() {
        init_logging();
        let factory = CacheFactory::new();
        assert!(factory.is_empty());
        assert!(factory.get("main").is_none());

        let first = factory
            .create("main", ProviderSpec::Array(ArrayConfig::default()))
            .await
            .unwrap();
        assert_eq!(factory.len(), 1);
        assert!(factory.get("main").is_some());

        // Repeat call returns the identical instance even with a
        // different spec: first write wins.
        let second = factory.create("main", ProviderSpec::Void).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_ids_get_distinct_instances() {
        let factory = CacheFactory::new();
        let a = factory
            .create("a", ProviderSpec::Array(ArrayConfig::default()))
            .await
            .unwrap();
        let b = factory
            .create("b", ProviderSpec::Array(ArrayConfig::default()))
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(factory.len(), 2);
    }

    #[tokio::test]
    async fn test_prebuilt_instance_is_adopted_unchanged() {
        let factory = CacheFactory::new();
        let prebuilt: Arc<dyn CacheProvider> = Arc::new(VoidProvider::new());

        let adopted = factory
            .create("x", ProviderSpec::Instance(prebuilt.clone()))
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&prebuilt, &adopted));

        let again = factory
            .create("x", ProviderSpec::Array(ArrayConfig::default()))
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&prebuilt, &again));
    }

    #[tokio::test]
    async fn test_empty_id_is_invalid_argument() {
        let factory = CacheFactory::new();
        let err = factory
            .create("", ProviderSpec::Array(ArrayConfig::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(factory.is_empty());
    }

    #[tokio::test]
    async fn test_denied_backend_is_missing_dependency() {
        let probe = StaticProbe::allow_all().deny(BackendKind::Array);
        let factory = CacheFactory::with_probe(Arc::new(probe));

        let err = factory
            .create("x", ProviderSpec::Array(ArrayConfig::default()))
            .await
            .unwrap_err();
        match err {
            Error::MissingDependency { feature, backend } => {
                assert_eq!(feature, "array");
                assert_eq!(backend, "array");
            }
            other => panic!("expected MissingDependency, got {:?}", other),
        }
        // The failed id stays unbound.
        assert!(factory.get("x").is_none());
    }

    #[tokio::test]
    async fn test_probe_does_not_gate_prebuilt_instances() {
        let probe = StaticProbe::allow_all().deny(BackendKind::Array);
        let factory = CacheFactory::with_probe(Arc::new(probe));

        let prebuilt: Arc<dyn CacheProvider> = Arc::new(VoidProvider::new());
        let adopted = factory
            .create("x", ProviderSpec::Instance(prebuilt.clone()))
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&prebuilt, &adopted));
    }

    #[tokio::test]
    async fn test_failed_construction_leaves_id_unset() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let factory = CacheFactory::new();
        let config = FilesystemConfig::default().with_directory(&blocker);
        let err = factory
            .create("fs", ProviderSpec::Filesystem(config))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BackendError(_)));
        assert!(factory.get("fs").is_none());

        // A corrected call under the same id succeeds.
        let corrected = FilesystemConfig::default().with_directory(dir.path().join("ok"));
        factory
            .create("fs", ProviderSpec::Filesystem(corrected))
            .await
            .unwrap();
        assert!(factory.get("fs").is_some());
    }

    #[tokio::test]
    async fn test_constructed_provider_satisfies_capability() {
        let factory = CacheFactory::new();
        let cache = factory
            .create("caps", ProviderSpec::Array(ArrayConfig::default()))
            .await
            .unwrap();

        cache.set("k", b"v".to_vec(), None).await.unwrap();
        assert!(cache.contains("k").await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
        cache.delete("k").await.unwrap();
        assert!(!cache.contains("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_keyword_driven_creation() {
        let factory = CacheFactory::new();
        let kind: BackendKind = "array".parse().unwrap();
        let spec = ProviderSpec::with_defaults(kind).unwrap();
        let cache = factory.create("from-keyword", spec).await.unwrap();

        cache.set("k", b"v".to_vec(), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_time_creates_share_one_instance() {
        init_logging();
        let factory = Arc::new(CacheFactory::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let factory = factory.clone();
            handles.push(tokio::spawn(async move {
                factory
                    .create("shared", ProviderSpec::Array(ArrayConfig::default()))
                    .await
                    .unwrap()
            }));
        }

        let mut providers = Vec::new();
        for handle in handles {
            providers.push(handle.await.unwrap());
        }

        assert_eq!(factory.len(), 1);
        for provider in &providers[1..] {
            assert!(Arc::ptr_eq(&providers[0], provider));
        }
    }

    #[cfg(feature = "redis")]
    #[tokio::test]
    async fn test_redis_without_client_is_invalid_config() {
        use crate::backend::RedisConfig;

        let factory = CacheFactory::new();
        let err = factory
            .create("r", ProviderSpec::Redis(RedisConfig::default()))
            .await
            .unwrap_err();
        match err {
            Error::InvalidConfig { key, .. } => assert_eq!(key, "redis.client"),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
        assert!(factory.get("r").is_none());
    }

    #[cfg(feature = "memcached")]
    #[tokio::test]
    async fn test_memcached_without_pool_is_invalid_config() {
        use crate::backend::MemcachedConfig;

        let factory = CacheFactory::new();
        let err = factory
            .create("m", ProviderSpec::Memcached(MemcachedConfig::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { key, .. } if key == "memcached.pool"));
    }
}
