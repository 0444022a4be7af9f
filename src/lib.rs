//! # cache-foundry
//!
//! A memoizing factory for pluggable cache-provider backends.
//!
//! ## Features
//!
//! - **Backend Agnostic:** in-memory, filesystem, Redis, Memcached,
//!   SQLite, MongoDB, and a no-op void backend behind one trait
//! - **Typed Configuration:** each backend carries its own config
//!   struct, validated at construction time
//! - **Memoized:** instances are shared by identifier; repeat requests
//!   return the same `Arc` (first write wins)
//! - **Caller-Owned Connections:** networked backends adapt a live
//!   handle you supply; the factory never opens or closes connections
//! - **Testable Capability Probing:** backend availability is an
//!   injected predicate, so tests can simulate missing dependencies
//!
//! ## Quick Start
//!
//! ```
//! use cache_foundry::{backend::ArrayConfig, CacheFactory, ProviderSpec};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> cache_foundry::Result<()> {
//! let factory = CacheFactory::new();
//!
//! let cache = factory
//!     .create("sessions", ProviderSpec::Array(ArrayConfig::default()))
//!     .await?;
//!
//! cache.set("user:42", b"profile".to_vec(), None).await?;
//! assert!(cache.contains("user:42").await?);
//!
//! // The same id yields the same instance, whatever spec is passed.
//! let again = factory.create("sessions", ProviderSpec::Void).await?;
//! assert!(std::sync::Arc::ptr_eq(&cache, &again));
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod error;
pub mod factory;
pub mod kind;
pub mod probe;
pub mod provider;
mod serialization;

// Re-exports for convenience
pub use error::{Error, Result};
pub use factory::{CacheFactory, ProviderSpec};
pub use kind::BackendKind;
pub use probe::{CapabilityProbe, RuntimeProbe, StaticProbe};
pub use provider::CacheProvider;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
