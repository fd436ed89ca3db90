//! Durable key-value seam under the metadata store.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::error::{Result, SundialError};

/// Ordered string-keyed store holding one JSON document per key.
pub trait MetaKv: Send + Sync + Debug {
    /// Value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Insert or replace the value under `key`.
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`. Returns whether it was present.
    fn delete(&self, key: &str) -> Result<bool>;

    /// All entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// Flush buffered writes to durable storage.
    fn sync(&self) -> Result<()>;

    /// Release the handle. Later calls fail with [`SundialError::StoreClosed`].
    fn close(&self) -> Result<()>;
}

/// Process-local [`MetaKv`] backed by a `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemoryMetaKv {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    closed: AtomicBool,
}

impl MemoryMetaKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(SundialError::StoreClosed)
        } else {
            Ok(())
        }
    }
}

impl MetaKv for MemoryMetaKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_open()?;
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.check_open()?;
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        self.check_open()?;
        Ok(self.entries.write().remove(key).is_some())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        self.check_open()?;
        Ok(scan_btree(&self.entries.read(), prefix))
    }

    fn sync(&self) -> Result<()> {
        self.check_open()
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

pub(crate) fn scan_btree(
    entries: &BTreeMap<String, Vec<u8>>,
    prefix: &str,
) -> Vec<(String, Vec<u8>)> {
    entries
        .range(prefix.to_string()..)
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_delete() {
        let kv = MemoryMetaKv::new();
        kv.set("/_index/a", b"{}").unwrap();
        assert_eq!(kv.get("/_index/a").unwrap(), Some(b"{}".to_vec()));
        assert!(kv.delete("/_index/a").unwrap());
        assert!(!kv.delete("/_index/a").unwrap());
        assert_eq!(kv.get("/_index/a").unwrap(), None);
    }

    #[test]
    fn test_scan_prefix_is_ordered_and_bounded() {
        let kv = MemoryMetaKv::new();
        kv.set("/_index/b", b"2").unwrap();
        kv.set("/_index/a", b"1").unwrap();
        kv.set("/_index_template/t", b"3").unwrap();
        kv.set("/_alias/x", b"4").unwrap();

        let keys: Vec<String> = kv
            .scan_prefix("/_index/")
            .unwrap()
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys, vec!["/_index/a", "/_index/b"]);
    }

    #[test]
    fn test_closed_store_rejects_calls() {
        let kv = MemoryMetaKv::new();
        kv.close().unwrap();
        assert!(matches!(kv.get("k"), Err(SundialError::StoreClosed)));
        assert!(matches!(kv.set("k", b"v"), Err(SundialError::StoreClosed)));
    }
}
