//! Error types for cache-foundry.

use thiserror::Error;

/// All errors surfaced by the factory and the backend adapters.
///
/// Factory errors (`InvalidArgument`, `InvalidConfig`, `MissingDependency`,
/// `InvalidType`) are raised synchronously during `create` and are never
/// retried internally; the caller must supply corrected input and call
/// again. `BackendError` and the serialization variants surface failures
/// from the underlying storage crates at construction or operation time.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed call-site arguments (e.g. an empty instance identifier).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A required configuration field for the chosen backend is missing
    /// or carries the wrong capability.
    #[error("invalid cache config \"{key}\". It must be {expected}")]
    InvalidConfig { key: String, expected: String },

    /// The chosen backend's required runtime feature is unavailable.
    #[error("feature \"{feature}\" is required by the \"{backend}\" cache provider but is not available in this runtime")]
    MissingDependency { feature: String, backend: String },

    /// The backend keyword is not among the supported set.
    #[error("invalid cache type \"{requested}\". Valid cache types: {available}")]
    InvalidType { requested: String, available: String },

    /// Failure reported by the underlying storage crate.
    #[error("cache backend error: {0}")]
    BackendError(String),

    /// Entry could not be encoded for storage.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Stored bytes do not form a valid cache envelope.
    #[error("invalid cache entry: {0}")]
    InvalidCacheEntry(String),

    /// Stored envelope was written by an incompatible schema version.
    #[error("cache entry version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build an `InvalidConfig` error naming the offending key and the
    /// capability it must carry.
    pub fn invalid_config(key: impl Into<String>, expected: impl Into<String>) -> Self {
        Error::InvalidConfig {
            key: key.into(),
            expected: expected.into(),
        }
    }

    pub fn missing_dependency(feature: impl Into<String>, backend: impl Into<String>) -> Self {
        Error::MissingDependency {
            feature: feature.into(),
            backend: backend.into(),
        }
    }
}
