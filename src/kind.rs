//! The closed set of supported backend kinds.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// Identifies which cache backend the factory should construct.
///
/// The set is closed: adding a backend means adding a variant here, a
/// config struct under `backend/`, and a `ProviderSpec` arm. Matching on
/// this enum is exhaustive, so the compiler flags any arm a new backend
/// misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// In-process map, no persistence.
    Array,
    /// No-op provider: never stores, never hits.
    Void,
    /// One file per entry under a configurable directory.
    Filesystem,
    /// Adapter over a caller-supplied Redis connection.
    Redis,
    /// Adapter over a caller-supplied Memcached connection pool.
    Memcached,
    /// Adapter over a caller-supplied SQLite pool and table.
    Sqlite,
    /// Adapter over a caller-supplied MongoDB database handle.
    Mongodb,
}

impl BackendKind {
    /// Every supported kind, in canonical order. Used to enumerate the
    /// valid keywords in `InvalidType` messages.
    pub const ALL: &'static [BackendKind] = &[
        BackendKind::Array,
        BackendKind::Void,
        BackendKind::Filesystem,
        BackendKind::Redis,
        BackendKind::Memcached,
        BackendKind::Sqlite,
        BackendKind::Mongodb,
    ];

    /// Canonical lowercase keyword for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Array => "array",
            BackendKind::Void => "void",
            BackendKind::Filesystem => "filesystem",
            BackendKind::Redis => "redis",
            BackendKind::Memcached => "memcached",
            BackendKind::Sqlite => "sqlite",
            BackendKind::Mongodb => "mongodb",
        }
    }

    /// The runtime feature the capability probe checks before this kind
    /// may be constructed. `None` for kinds that need nothing beyond the
    /// standard library and always-compiled dependencies.
    pub fn feature_name(&self) -> Option<&'static str> {
        match self {
            BackendKind::Array | BackendKind::Void | BackendKind::Filesystem => None,
            BackendKind::Redis => Some("redis"),
            BackendKind::Memcached => Some("memcached"),
            BackendKind::Sqlite => Some("sqlite"),
            BackendKind::Mongodb => Some("mongodb"),
        }
    }

    /// Comma-separated list of every supported keyword.
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "array" | "memory" | "inmemory" | "in_memory" => Ok(BackendKind::Array),
            "void" | "noop" | "null" => Ok(BackendKind::Void),
            "filesystem" | "file" => Ok(BackendKind::Filesystem),
            "redis" => Ok(BackendKind::Redis),
            "memcached" => Ok(BackendKind::Memcached),
            "sqlite" | "sqlite3" => Ok(BackendKind::Sqlite),
            "mongodb" | "mongo" => Ok(BackendKind::Mongodb),
            _ => Err(Error::InvalidType {
                requested: s.to_string(),
                available: BackendKind::supported_list(),
            }),
        }
    }
}
