//! Parallel whole-object reads built from range requests.
//!
//! A fetch probes the object length, splits `[0, len)` into at most
//! `parallelism` contiguous partitions of `ceil(len / W)` bytes and reads them
//! concurrently into disjoint slices of one destination buffer. The first
//! failing partition cancels every partition that has not issued its read
//! yet; the call still waits for reads already in flight and then returns the
//! error alone. A partially filled buffer never leaves this module.

use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error};
use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Result, SundialError};
use crate::storage::ObjectStore;

/// Bounded fan-out reader shared by the object store backends.
#[derive(Debug, Clone)]
pub struct ParallelFetcher {
    parallelism: usize,
    pool: Arc<ThreadPool>,
}

impl ParallelFetcher {
    /// Create a fetcher running at most `parallelism` range reads at once.
    ///
    /// `0` selects the number of available CPUs.
    pub fn new(parallelism: usize) -> Result<Self> {
        let parallelism = if parallelism == 0 {
            num_cpus::get().max(1)
        } else {
            parallelism
        };
        Self::with_threads(parallelism, parallelism)
    }

    /// Split objects into `parallelism` partitions but read them on a pool of
    /// `threads` workers. Partitions beyond the pool width wait for a free
    /// worker and are skipped once a read has failed.
    pub fn with_threads(parallelism: usize, threads: usize) -> Result<Self> {
        if parallelism == 0 || threads == 0 {
            return Err(SundialError::invalid_argument(
                "fetch parallelism and pool size must be positive",
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("sundial-fetch-{i}"))
            .build()
            .map_err(|e| SundialError::storage(format!("failed to start fetch pool: {e}")))?;

        Ok(ParallelFetcher {
            parallelism,
            pool: Arc::new(pool),
        })
    }

    /// Upper bound on concurrent range reads.
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Partition `[0, size)` the way [`fetch`](Self::fetch) does.
    ///
    /// Partitions whose start would fall at or beyond `size` are omitted, so
    /// small objects get fewer partitions than `parallelism`.
    pub fn plan(&self, size: u64) -> Vec<Range<u64>> {
        if size == 0 {
            return Vec::new();
        }
        let workers = (self.parallelism as u64).min(size).max(1);
        let part_size = size.div_ceil(workers);

        (0..workers)
            .map(|i| i * part_size)
            .take_while(|&start| start < size)
            .map(|start| start..(start + part_size).min(size))
            .collect()
    }

    /// Read the whole object at `(bucket, path)` from `store`.
    pub fn fetch<S>(&self, store: &S, bucket: &str, path: &str) -> Result<Vec<u8>>
    where
        S: ObjectStore + ?Sized,
    {
        let meta = store.head(bucket, path)?;
        if meta.size == 0 {
            return Ok(Vec::new());
        }

        let size = usize::try_from(meta.size).map_err(|_| {
            SundialError::storage(format!("object too large to buffer: {bucket}/{path}"))
        })?;
        let partitions = self.plan(meta.size);
        let part_size = partitions[0].end as usize;

        debug!(
            "fetching {bucket}/{path}: {size} bytes in {} partitions",
            partitions.len()
        );

        let mut content = vec![0u8; size];
        let cancelled = AtomicBool::new(false);
        let failure: Mutex<Option<SundialError>> = Mutex::new(None);

        self.pool.install(|| {
            content
                .par_chunks_mut(part_size)
                .enumerate()
                .for_each(|(part, chunk)| {
                    if cancelled.load(Ordering::Acquire) {
                        return;
                    }
                    let start = (part * part_size) as u64;
                    let range = start..start + chunk.len() as u64;

                    let outcome = store
                        .get_range(bucket, path, range.clone())
                        .and_then(|bytes| {
                            if bytes.len() == chunk.len() {
                                chunk.copy_from_slice(&bytes);
                                Ok(())
                            } else {
                                Err(SundialError::storage(format!(
                                    "short range read on {bucket}/{path} {range:?}: got {} bytes",
                                    bytes.len()
                                )))
                            }
                        });

                    if let Err(e) = outcome {
                        error!("range read {range:?} of {bucket}/{path} failed: {e}");
                        cancelled.store(true, Ordering::Release);
                        failure.lock().get_or_insert(e);
                    }
                });
        });

        match failure.into_inner() {
            Some(e) => Err(e),
            None => Ok(content),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::storage::memory::{MemoryObjectStore, MemoryObjectStoreConfig};
    use crate::storage::ObjectMeta;

    /// Store wrapper that fails range reads overlapping `poisoned`.
    #[derive(Debug)]
    struct FlakyStore {
        inner: MemoryObjectStore,
        poisoned: Option<u64>,
        truncate: bool,
        range_calls: AtomicUsize,
    }

    impl FlakyStore {
        fn new(data: &[u8]) -> Self {
            let inner = MemoryObjectStore::new(MemoryObjectStoreConfig::default()).unwrap();
            inner.create_bucket("b").unwrap();
            inner.put("b", "obj", data).unwrap();
            FlakyStore {
                inner,
                poisoned: None,
                truncate: false,
                range_calls: AtomicUsize::new(0),
            }
        }
    }

    impl ObjectStore for FlakyStore {
        fn bucket_exists(&self, bucket: &str) -> Result<bool> {
            self.inner.bucket_exists(bucket)
        }

        fn create_bucket(&self, bucket: &str) -> Result<()> {
            self.inner.create_bucket(bucket)
        }

        fn put(&self, bucket: &str, path: &str, data: &[u8]) -> Result<()> {
            self.inner.put(bucket, path, data)
        }

        fn head(&self, bucket: &str, path: &str) -> Result<ObjectMeta> {
            self.inner.head(bucket, path)
        }

        fn get_range(&self, bucket: &str, path: &str, range: Range<u64>) -> Result<Vec<u8>> {
            self.range_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(offset) = self.poisoned {
                if range.contains(&offset) {
                    return Err(SundialError::storage("injected failure"));
                }
            }
            let mut bytes = self.inner.get_range(bucket, path, range)?;
            if self.truncate {
                bytes.pop();
            }
            Ok(bytes)
        }

        fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
            self.inner.get(bucket, path)
        }

        fn delete(&self, bucket: &str, path: &str) -> Result<()> {
            self.inner.delete(bucket, path)
        }

        fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>> {
            self.inner.list(bucket, prefix)
        }
    }

    #[test]
    fn test_plan_partitions() {
        let fetcher = ParallelFetcher::new(4).unwrap();
        assert!(fetcher.plan(0).is_empty());
        assert_eq!(fetcher.plan(1), vec![0..1]);
        assert_eq!(fetcher.plan(3), vec![0..1, 1..2, 2..3]);
        assert_eq!(fetcher.plan(10), vec![0..3, 3..6, 6..9, 9..10]);
        // ceil(5 / 4) = 2 leaves the fourth partition starting past the end.
        assert_eq!(fetcher.plan(5), vec![0..2, 2..4, 4..5]);
    }

    #[test]
    fn test_fetch_reassembles_content() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let store = FlakyStore::new(&data);
        let fetcher = ParallelFetcher::new(8).unwrap();

        assert_eq!(fetcher.fetch(&store, "b", "obj").unwrap(), data);
        assert_eq!(store.range_calls.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_fetch_empty_object_skips_range_reads() {
        let store = FlakyStore::new(b"");
        let fetcher = ParallelFetcher::new(4).unwrap();

        assert!(fetcher.fetch(&store, "b", "obj").unwrap().is_empty());
        assert_eq!(store.range_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fetch_failure_returns_error_only() {
        let mut store = FlakyStore::new(&[7u8; 64]);
        store.poisoned = Some(40);
        let fetcher = ParallelFetcher::new(4).unwrap();

        let err = fetcher.fetch(&store, "b", "obj").unwrap_err();
        assert!(err.to_string().contains("injected failure"));
    }

    #[test]
    fn test_fetch_failure_cancels_pending_partitions() {
        let mut store = FlakyStore::new(&[7u8; 64]);
        store.poisoned = Some(0);
        // One worker runs the partitions in order, so the failing first read
        // happens before any other partition is issued.
        let fetcher = ParallelFetcher::with_threads(4, 1).unwrap();
        assert_eq!(fetcher.plan(64).len(), 4);

        let err = fetcher.fetch(&store, "b", "obj").unwrap_err();
        assert!(err.to_string().contains("injected failure"));
        assert_eq!(store.range_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_pool_size_is_rejected() {
        assert!(matches!(
            ParallelFetcher::with_threads(4, 0),
            Err(SundialError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_fetch_short_read_is_an_error() {
        let mut store = FlakyStore::new(&[1u8; 16]);
        store.truncate = true;
        let fetcher = ParallelFetcher::new(2).unwrap();

        let err = fetcher.fetch(&store, "b", "obj").unwrap_err();
        assert!(err.to_string().contains("short range read"));
    }

    #[test]
    fn test_fetch_missing_object() {
        let store = FlakyStore::new(b"abc");
        let fetcher = ParallelFetcher::new(2).unwrap();

        let err = fetcher.fetch(&store, "b", "missing").unwrap_err();
        assert!(err.is_not_found());
    }
}
