//! Segment object storage.
//!
//! Immutable segment blobs are addressed by `(bucket, path)` and live behind
//! the [`ObjectStore`] trait, so that a local directory, process memory or a
//! remote object service can be swapped without touching the segment code.
//!
//! # Architecture
//!
//! - **ObjectStore trait**: put/get/delete/list plus bucket management and the
//!   two primitives the parallel reader is built on, `head` and `get_range`
//! - **ParallelFetcher**: splits a `get` into bounded concurrent range reads
//! - **StorageConfig enum**: type-safe configuration for supported backends
//! - **StorageFactory**: helper for constructing concrete stores
//!
//! Writes are synchronous and never retried here; retry policy belongs to the
//! caller.
//!
//! # Backends
//!
//! This crate ships two backends: [`LocalObjectStore`] for a directory tree
//! and [`MemoryObjectStore`] for tests and ephemeral use. No remote client is
//! bundled. A remote service is added by implementing [`ObjectStore`] for its
//! client; `head` and `get_range` are all [`ParallelFetcher`] needs to give it
//! the same bounded parallel `get`.
//!
//! # Example
//!
//! ```
//! use sundial::storage::{StorageConfig, StorageFactory};
//! use sundial::storage::memory::MemoryObjectStoreConfig;
//!
//! # fn main() -> sundial::error::Result<()> {
//! let store = StorageFactory::create(StorageConfig::Memory(MemoryObjectStoreConfig::default()))?;
//! store.create_bucket("segments")?;
//! store.put("segments", "logs/0001.seg", b"segment bytes")?;
//! assert_eq!(store.get("segments", "logs/0001.seg")?, b"segment bytes");
//! # Ok(())
//! # }
//! ```

use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SundialError};

pub mod fetch;
pub mod file;
pub mod memory;
pub mod structured;

pub use fetch::ParallelFetcher;
pub use file::{LocalObjectStore, LocalObjectStoreConfig};
pub use memory::{MemoryObjectStore, MemoryObjectStoreConfig};

/// Descriptor of a stored object, as returned by `head` and `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Bucket holding the object.
    pub bucket: String,
    /// Object path inside the bucket, `/`-separated.
    pub path: String,
    /// Content length in bytes.
    pub size: u64,
    /// Last modification time, when the backend tracks one.
    pub modified: Option<DateTime<Utc>>,
}

/// Blob storage for immutable segment objects.
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Check whether a bucket exists.
    fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Create a bucket. Creating an existing bucket is not an error.
    fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Store `data` under `(bucket, path)`, replacing any previous object.
    fn put(&self, bucket: &str, path: &str, data: &[u8]) -> Result<()>;

    /// Probe an object's metadata without reading its content.
    fn head(&self, bucket: &str, path: &str) -> Result<ObjectMeta>;

    /// Read the bytes in `range` (end exclusive) of an object.
    ///
    /// The range must lie inside the object; a short read is an error.
    fn get_range(&self, bucket: &str, path: &str, range: Range<u64>) -> Result<Vec<u8>>;

    /// Read a whole object.
    ///
    /// Backends answer this through their [`ParallelFetcher`], which issues
    /// bounded concurrent `get_range` calls.
    fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>>;

    /// Delete an object. Deleting a missing object is not an error.
    fn delete(&self, bucket: &str, path: &str) -> Result<()>;

    /// List objects whose path starts with `prefix`, sorted by path.
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>>;
}

/// Reject bucket names and object paths the backends cannot address safely.
pub(crate) fn validate_location(bucket: &str, path: &str) -> Result<()> {
    validate_bucket(bucket)?;
    if path.is_empty() {
        return Err(SundialError::invalid_argument("object path must not be empty"));
    }
    if path.starts_with('/') || path.contains('\\') {
        return Err(SundialError::invalid_argument(format!(
            "object path must be relative: {path}"
        )));
    }
    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(SundialError::invalid_argument(format!(
            "object path has an empty or relative segment: {path}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_bucket(bucket: &str) -> Result<()> {
    let valid = !bucket.is_empty()
        && bucket
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && bucket != "."
        && bucket != "..";
    if valid {
        Ok(())
    } else {
        Err(SundialError::invalid_argument(format!(
            "invalid bucket name: {bucket:?}"
        )))
    }
}

/// Enum-based configuration for the supported object store backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Directory-backed storage; one sub-directory per bucket.
    Local(LocalObjectStoreConfig),

    /// Process-memory storage.
    Memory(MemoryObjectStoreConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory(MemoryObjectStoreConfig::default())
    }
}

/// A factory for creating object stores from configuration.
pub struct StorageFactory;

impl StorageFactory {
    /// Create a new object store with the given configuration.
    pub fn create(config: StorageConfig) -> Result<Arc<dyn ObjectStore>> {
        match config {
            StorageConfig::Memory(mem_config) => Ok(Arc::new(MemoryObjectStore::new(mem_config)?)),
            StorageConfig::Local(local_config) => {
                Ok(Arc::new(LocalObjectStore::new(local_config)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_location() {
        assert!(validate_location("segments", "logs/2024/0001.seg").is_ok());
        assert!(validate_location("", "a").is_err());
        assert!(validate_location("seg/ments", "a").is_err());
        assert!(validate_location("segments", "").is_err());
        assert!(validate_location("segments", "/abs").is_err());
        assert!(validate_location("segments", "a/../b").is_err());
        assert!(validate_location("segments", "a//b").is_err());
    }

    #[test]
    fn test_storage_config_serde() {
        let config: StorageConfig =
            serde_json::from_str(r#"{"type":"local","root":"/tmp/objects"}"#).unwrap();
        match config {
            StorageConfig::Local(local) => {
                assert_eq!(local.root, std::path::PathBuf::from("/tmp/objects"));
                assert!(!local.sync_writes);
            }
            StorageConfig::Memory(_) => panic!("expected local config"),
        }
    }

    #[test]
    fn test_factory_creates_memory_store() {
        let store = StorageFactory::create(StorageConfig::default()).unwrap();
        assert!(!store.bucket_exists("segments").unwrap());
        store.create_bucket("segments").unwrap();
        assert!(store.bucket_exists("segments").unwrap());
    }
}
