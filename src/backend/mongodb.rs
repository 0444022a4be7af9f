//! MongoDB cache backend over a caller-supplied database handle.

use crate::error::{Error, Result};
use crate::provider::CacheProvider;
use crate::serialization::{decode_entry, encode_entry, StoredEntry};
use async_trait::async_trait;
use mongodb::bson::spec::BinarySubtype;
use mongodb::bson::{doc, Binary};
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_COLLECTION: &str = "cache_entries";

/// Configuration for the MongoDB backend.
///
/// The database handle is owned by the caller; the factory only
/// validates that one was supplied.
#[derive(Clone, Debug)]
pub struct MongodbConfig {
    /// Live database handle. Required.
    pub database: Option<Database>,
    /// Collection entries are stored in.
    pub collection: String,
}

impl Default for MongodbConfig {
    fn default() -> Self {
        MongodbConfig {
            database: None,
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

impl MongodbConfig {
    pub fn new(database: Database) -> Self {
        MongodbConfig {
            database: Some(database),
            ..Default::default()
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }
}

/// One cached entry as stored in the collection. The envelope bytes
/// carry the expiry, so no TTL index is required.
#[derive(Debug, Serialize, Deserialize)]
struct CacheDocument {
    #[serde(rename = "_id")]
    key: String,
    envelope: Binary,
}

/// MongoDB adapter storing entries as `{ _id, envelope }` documents.
#[derive(Clone)]
pub struct MongodbProvider {
    collection: Collection<CacheDocument>,
}

impl MongodbProvider {
    /// # Errors
    /// Returns `Error::InvalidConfig` naming `mongodb.database` if no
    /// database handle was supplied.
    pub fn new(config: MongodbConfig) -> Result<Self> {
        let database = config.database.ok_or_else(|| {
            Error::invalid_config("mongodb.database", "an instance of mongodb::Database")
        })?;

        if config.collection.is_empty() {
            return Err(Error::invalid_config(
                "mongodb.collection",
                "a non-empty collection name",
            ));
        }

        let collection = database.collection::<CacheDocument>(&config.collection);
        info!(
            "mongodb cache backend initialized (collection: {})",
            config.collection
        );
        Ok(MongodbProvider { collection })
    }

    async fn read_entry(&self, key: &str) -> Result<Option<StoredEntry>> {
        let document = self
            .collection
            .find_one(doc! { "_id": key })
            .await
            .map_err(|e| {
                Error::BackendError(format!("mongodb find failed for key {}: {}", key, e))
            })?;

        let Some(document) = document else {
            return Ok(None);
        };

        let entry = decode_entry(&document.envelope.bytes)?;
        if entry.is_expired() {
            debug!("mongodb GET {} -> expired", key);
            self.delete(key).await?;
            return Ok(None);
        }
        Ok(Some(entry))
    }
}

#[async_trait]
impl CacheProvider for MongodbProvider {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.read_entry(key).await? {
            Some(entry) => {
                debug!("mongodb GET {} -> hit", key);
                Ok(Some(entry.data))
            }
            None => {
                debug!("mongodb GET {} -> miss", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let bytes = encode_entry(&StoredEntry::new(value, ttl))?;
        let document = CacheDocument {
            key: key.to_string(),
            envelope: Binary {
                subtype: BinarySubtype::Generic,
                bytes,
            },
        };

        self.collection
            .replace_one(doc! { "_id": key }, document)
            .upsert(true)
            .await
            .map_err(|e| {
                Error::BackendError(format!("mongodb upsert failed for key {}: {}", key, e))
            })?;

        debug!("mongodb SET {} (ttl: {:?})", key, ttl);
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.read_entry(key).await?.is_some())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.collection
            .delete_one(doc! { "_id": key })
            .await
            .map_err(|e| {
                Error::BackendError(format!("mongodb delete failed for key {}: {}", key, e))
            })?;

        debug!("mongodb DELETE {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_database_is_invalid_config() {
        let err = MongodbProvider::new(MongodbConfig::default()).unwrap_err();
        match err {
            Error::InvalidConfig { key, expected } => {
                assert_eq!(key, "mongodb.database");
                assert!(expected.contains("mongodb::Database"));
            }
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }
}
