//! Capability detection for backend kinds.
//!
//! The original design probed the runtime lazily at construction time
//! (is the driver loaded?). Here the probe is an injected abstraction so
//! the factory can be tested against environments that lack a dependency
//! without rebuilding with different features.

use crate::kind::BackendKind;
use std::collections::HashSet;

/// Answers whether a backend kind can be constructed in this runtime.
pub trait CapabilityProbe: Send + Sync {
    fn is_available(&self, kind: BackendKind) -> bool;
}

/// Default probe: answers from the cargo features this crate was
/// compiled with. Kinds with no feature requirement are always
/// available.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuntimeProbe;

impl CapabilityProbe for RuntimeProbe {
    fn is_available(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Array | BackendKind::Void | BackendKind::Filesystem => true,
            BackendKind::Redis => cfg!(feature = "redis"),
            BackendKind::Memcached => cfg!(feature = "memcached"),
            BackendKind::Sqlite => cfg!(feature = "sqlite"),
            BackendKind::Mongodb => cfg!(feature = "mongodb"),
        }
    }
}

/// Probe with a fixed deny-set. Lets tests simulate a runtime where a
/// given backend's dependency is missing.
#[derive(Debug, Default, Clone)]
pub struct StaticProbe {
    denied: HashSet<BackendKind>,
}

impl StaticProbe {
    /// Probe that reports every kind as available.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Mark `kind` as unavailable.
    pub fn deny(mut self, kind: BackendKind) -> Self {
        self.denied.insert(kind);
        self
    }
}

impl CapabilityProbe for StaticProbe {
    fn is_available(&self, kind: BackendKind) -> bool {
        !self.denied.contains(&kind)
    }
}
