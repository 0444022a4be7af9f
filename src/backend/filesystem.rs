//! Filesystem cache backend: one file per entry.

use crate::error::{Error, Result};
use crate::provider::CacheProvider;
use crate::serialization::{decode_entry, encode_entry, StoredEntry};
use async_trait::async_trait;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default permission bits applied to entry files on Unix.
const DEFAULT_FILE_MODE: u32 = 0o644;

/// Configuration for the filesystem backend. All fields have defaults;
/// nothing is required.
#[derive(Clone, Debug)]
pub struct FilesystemConfig {
    /// Directory entry files live in. Created on construction.
    pub directory: PathBuf,
    /// Extension appended to entry filenames, including the dot.
    pub extension: String,
    /// Permission bits for entry files (Unix only).
    pub file_mode: u32,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        FilesystemConfig {
            directory: std::env::temp_dir().join("cache-foundry"),
            extension: ".cache".to_string(),
            file_mode: DEFAULT_FILE_MODE,
        }
    }
}

impl FilesystemConfig {
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }
}

/// Cache backend persisting each entry as a file under a directory.
///
/// Entry files hold the versioned envelope, so expiry survives process
/// restarts. Keys are hashed to stable filenames; blocking filesystem
/// work runs on the tokio blocking pool.
pub struct FilesystemProvider {
    config: FilesystemConfig,
}

impl FilesystemProvider {
    /// Create the backend, creating the cache directory if needed.
    ///
    /// # Errors
    /// Returns `Error::BackendError` if the directory cannot be created.
    pub fn new(config: FilesystemConfig) -> Result<Self> {
        fs::create_dir_all(&config.directory).map_err(|e| {
            Error::BackendError(format!(
                "failed to create cache directory {}: {}",
                config.directory.display(),
                e
            ))
        })?;

        info!(
            "filesystem cache backend initialized at {}",
            config.directory.display()
        );
        Ok(FilesystemProvider { config })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name = format!("{:016x}{}", fnv1a64(key.as_bytes()), self.config.extension);
        self.config.directory.join(name)
    }

    async fn read_entry(&self, key: &str) -> Result<Option<StoredEntry>> {
        let path = self.path_for(key);
        let bytes = run_blocking(move || match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::BackendError(format!(
                "failed to read cache file {}: {}",
                path.display(),
                e
            ))),
        })
        .await?;

        let Some(bytes) = bytes else {
            return Ok(None);
        };

        let entry = decode_entry(&bytes)?;
        if entry.is_expired() {
            debug!("filesystem GET {} -> expired", key);
            self.delete(key).await?;
            return Ok(None);
        }
        Ok(Some(entry))
    }
}

#[async_trait]
impl CacheProvider for FilesystemProvider {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.read_entry(key).await? {
            Some(entry) => {
                debug!("filesystem GET {} -> hit", key);
                Ok(Some(entry.data))
            }
            None => {
                debug!("filesystem GET {} -> miss", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let bytes = encode_entry(&StoredEntry::new(value, ttl))?;
        let path = self.path_for(key);
        let mode = self.config.file_mode;

        run_blocking(move || write_atomic(&path, &bytes, mode)).await?;
        debug!("filesystem SET {} (ttl: {:?})", key, ttl);
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.read_entry(key).await?.is_some())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        run_blocking(move || match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::BackendError(format!(
                "failed to remove cache file {}: {}",
                path.display(),
                e
            ))),
        })
        .await?;

        debug!("filesystem DELETE {}", key);
        Ok(())
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::BackendError(format!("blocking filesystem task failed: {}", e)))?
}

/// Write via a sibling temp file plus rename, so readers never observe
/// a partially written envelope.
fn write_atomic(path: &Path, bytes: &[u8], mode: u32) -> Result<()> {
    // Append rather than swap the extension: a configured extension of
    // ".tmp" must not make the temp name collide with the final path.
    let tmp = {
        let mut name = path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    };

    fs::write(&tmp, bytes).map_err(|e| {
        Error::BackendError(format!(
            "failed to write cache file {}: {}",
            tmp.display(),
            e
        ))
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(mode)).map_err(|e| {
            Error::BackendError(format!(
                "failed to set permissions on {}: {}",
                tmp.display(),
                e
            ))
        })?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    fs::rename(&tmp, path).map_err(|e| {
        Error::BackendError(format!(
            "failed to move cache file into place at {}: {}",
            path.display(),
            e
        ))
    })
}

/// FNV-1a over the key, giving short, stable, filesystem-safe names.
fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
