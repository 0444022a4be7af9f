//! Versioned envelope for stored cache entries.
//!
//! Backends that persist bytes outside the process (filesystem, sqlite,
//! mongodb) and the in-process array backend all store a `StoredEntry`
//! so expiry travels with the value. On-storage format:
//!
//! ```text
//! [MAGIC: 4 bytes] [VERSION: u32 LE] [POSTCARD PAYLOAD]
//! ```
//!
//! Decoding validates the magic header and schema version before
//! touching the payload, so a corrupted or foreign file reads as an
//! error rather than as garbage data.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const MAGIC: &[u8; 4] = b"CFND";
const VERSION: u32 = 1;

/// A value plus its absolute expiry, as stored by the backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredEntry {
    /// Absolute expiry in milliseconds since the Unix epoch. `None`
    /// means the entry never expires.
    pub expires_at_ms: Option<u64>,
    pub data: Vec<u8>,
}

impl StoredEntry {
    pub fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        StoredEntry {
            expires_at_ms: ttl.map(|d| now_ms() + d.as_millis() as u64),
            data,
        }
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at_ms {
            Some(at) => now_ms() >= at,
            None => false,
        }
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Encode an entry into the envelope format.
pub(crate) fn encode_entry(entry: &StoredEntry) -> Result<Vec<u8>> {
    let payload = postcard::to_allocvec(entry)
        .map_err(|e| Error::SerializationError(format!("failed to encode cache entry: {}", e)))?;

    let mut buf = Vec::with_capacity(8 + payload.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decode an envelope, validating magic and version first.
pub(crate) fn decode_entry(bytes: &[u8]) -> Result<StoredEntry> {
    if bytes.len() < 8 {
        return Err(Error::InvalidCacheEntry(format!(
            "envelope too short: {} bytes",
            bytes.len()
        )));
    }

    if &bytes[0..4] != MAGIC {
        return Err(Error::InvalidCacheEntry(
            "bad magic header".to_string(),
        ));
    }

    let found = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if found != VERSION {
        return Err(Error::VersionMismatch {
            expected: VERSION,
            found,
        });
    }

    postcard::from_bytes(&bytes[8..])
        .map_err(|e| Error::SerializationError(format!("failed to decode cache entry: {}", e)))
}
