//! Backend adapters, one per supported kind.
//!
//! Each adapter is a thin layer over a pre-existing storage crate; no
//! cache engine lives here. Backends that talk to an external service
//! take a caller-supplied live handle in their config and never manage
//! its lifecycle.

mod array;
mod filesystem;
mod void;

#[cfg(feature = "memcached")]
mod memcached;
#[cfg(feature = "mongodb")]
mod mongodb;
#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use array::{ArrayConfig, ArrayProvider};
pub use filesystem::{FilesystemConfig, FilesystemProvider};
pub use void::VoidProvider;

#[cfg(feature = "memcached")]
pub use memcached::{MemcachedConfig, MemcachedProvider};
#[cfg(feature = "mongodb")]
pub use mongodb::{MongodbConfig, MongodbProvider};
#[cfg(feature = "redis")]
pub use redis::{RedisConfig, RedisProvider};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConfig, SqliteProvider};
