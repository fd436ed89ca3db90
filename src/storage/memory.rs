//! In-memory object store for tests and embedded use.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SundialError};
use crate::storage::fetch::ParallelFetcher;
use crate::storage::{ObjectMeta, ObjectStore, validate_bucket, validate_location};

/// Configuration for [`MemoryObjectStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryObjectStoreConfig {
    /// Maximum concurrent range reads per `get`; `0` means one per CPU.
    #[serde(default)]
    pub fetch_parallelism: usize,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Arc<[u8]>,
    modified: DateTime<Utc>,
}

/// An object store that keeps every bucket in process memory.
///
/// Objects are shared immutable byte slices, so range reads never copy more
/// than the requested window.
#[derive(Debug)]
pub struct MemoryObjectStore {
    buckets: RwLock<HashMap<String, BTreeMap<String, StoredObject>>>,
    fetcher: ParallelFetcher,
}

impl MemoryObjectStore {
    /// Create an empty store.
    pub fn new(config: MemoryObjectStoreConfig) -> Result<Self> {
        Ok(MemoryObjectStore {
            buckets: RwLock::new(HashMap::new()),
            fetcher: ParallelFetcher::new(config.fetch_parallelism)?,
        })
    }

    /// Total bytes held across all buckets.
    pub fn total_size(&self) -> u64 {
        self.buckets
            .read()
            .values()
            .flat_map(|objects| objects.values())
            .map(|object| object.data.len() as u64)
            .sum()
    }

    fn object(&self, bucket: &str, path: &str) -> Result<StoredObject> {
        validate_location(bucket, path)?;
        let buckets = self.buckets.read();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| SundialError::BucketNotFound(bucket.to_string()))?;
        objects
            .get(path)
            .cloned()
            .ok_or_else(|| SundialError::object_not_found(bucket, path))
    }
}

impl ObjectStore for MemoryObjectStore {
    fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        validate_bucket(bucket)?;
        Ok(self.buckets.read().contains_key(bucket))
    }

    fn create_bucket(&self, bucket: &str) -> Result<()> {
        validate_bucket(bucket)?;
        self.buckets.write().entry(bucket.to_string()).or_default();
        Ok(())
    }

    fn put(&self, bucket: &str, path: &str, data: &[u8]) -> Result<()> {
        validate_location(bucket, path)?;
        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| SundialError::BucketNotFound(bucket.to_string()))?;
        objects.insert(
            path.to_string(),
            StoredObject {
                data: Arc::from(data),
                modified: Utc::now(),
            },
        );
        debug!("put {bucket}/{path} ({} bytes)", data.len());
        Ok(())
    }

    fn head(&self, bucket: &str, path: &str) -> Result<ObjectMeta> {
        let object = self.object(bucket, path)?;
        Ok(ObjectMeta {
            bucket: bucket.to_string(),
            path: path.to_string(),
            size: object.data.len() as u64,
            modified: Some(object.modified),
        })
    }

    fn get_range(&self, bucket: &str, path: &str, range: Range<u64>) -> Result<Vec<u8>> {
        let object = self.object(bucket, path)?;
        let len = object.data.len() as u64;
        if range.start > range.end || range.end > len {
            return Err(SundialError::invalid_argument(format!(
                "range {range:?} outside {bucket}/{path} of {len} bytes"
            )));
        }
        Ok(object.data[range.start as usize..range.end as usize].to_vec())
    }

    fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        self.fetcher.fetch(self, bucket, path)
    }

    fn delete(&self, bucket: &str, path: &str) -> Result<()> {
        validate_location(bucket, path)?;
        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| SundialError::BucketNotFound(bucket.to_string()))?;
        objects.remove(path);
        Ok(())
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>> {
        validate_bucket(bucket)?;
        let buckets = self.buckets.read();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| SundialError::BucketNotFound(bucket.to_string()))?;

        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, object)| ObjectMeta {
                bucket: bucket.to_string(),
                path: path.clone(),
                size: object.data.len() as u64,
                modified: Some(object.modified),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> MemoryObjectStore {
        let store = MemoryObjectStore::new(MemoryObjectStoreConfig::default()).unwrap();
        store.create_bucket("segments").unwrap();
        store
    }

    #[test]
    fn test_put_get_delete() {
        let store = create_test_store();

        store.put("segments", "a/1.seg", b"hello").unwrap();
        assert_eq!(store.get("segments", "a/1.seg").unwrap(), b"hello");
        assert_eq!(store.head("segments", "a/1.seg").unwrap().size, 5);
        assert_eq!(store.total_size(), 5);

        store.delete("segments", "a/1.seg").unwrap();
        assert!(store.get("segments", "a/1.seg").unwrap_err().is_not_found());
        // Deleting twice is fine.
        store.delete("segments", "a/1.seg").unwrap();
    }

    #[test]
    fn test_put_requires_bucket() {
        let store = create_test_store();
        let err = store.put("missing", "x", b"1").unwrap_err();
        assert!(matches!(err, SundialError::BucketNotFound(_)));
    }

    #[test]
    fn test_list_by_prefix() {
        let store = create_test_store();
        store.put("segments", "logs/2", b"22").unwrap();
        store.put("segments", "logs/1", b"1").unwrap();
        store.put("segments", "metrics/1", b"333").unwrap();

        let listed: Vec<String> = store
            .list("segments", "logs/")
            .unwrap()
            .into_iter()
            .map(|meta| meta.path)
            .collect();
        assert_eq!(listed, vec!["logs/1", "logs/2"]);
        assert_eq!(store.list("segments", "").unwrap().len(), 3);
    }

    #[test]
    fn test_get_range_bounds() {
        let store = create_test_store();
        store.put("segments", "x", b"0123456789").unwrap();

        assert_eq!(store.get_range("segments", "x", 2..5).unwrap(), b"234");
        assert!(store.get_range("segments", "x", 8..11).is_err());
    }
}
