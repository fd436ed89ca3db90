//! Local-filesystem object store.
//!
//! Each bucket is a directory under the configured root and each object a
//! file at its `/`-separated path inside it. Puts go through a temporary file
//! in the same directory followed by a rename, so a reader never sees a
//! half-written object.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SundialError};
use crate::storage::fetch::ParallelFetcher;
use crate::storage::{ObjectMeta, ObjectStore, validate_bucket, validate_location};

const TEMP_PREFIX: &str = ".tmp-";

/// Configuration for [`LocalObjectStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalObjectStoreConfig {
    /// Directory holding one sub-directory per bucket.
    pub root: PathBuf,

    /// Whether to fsync object files before the rename that publishes them.
    #[serde(default)]
    pub sync_writes: bool,

    /// Maximum concurrent range reads per `get`; `0` means one per CPU.
    #[serde(default)]
    pub fetch_parallelism: usize,
}

impl LocalObjectStoreConfig {
    /// Create a configuration rooted at `root` with default settings.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        LocalObjectStoreConfig {
            root: root.into(),
            sync_writes: false,
            fetch_parallelism: 0,
        }
    }
}

/// A directory-backed object store.
#[derive(Debug)]
pub struct LocalObjectStore {
    root: PathBuf,
    sync_writes: bool,
    fetcher: ParallelFetcher,
}

impl LocalObjectStore {
    /// Open (creating if needed) a store rooted at `config.root`.
    pub fn new(config: LocalObjectStoreConfig) -> Result<Self> {
        let root = config.root;
        if !root.exists() {
            fs::create_dir_all(&root).map_err(|e| {
                SundialError::storage(format!("failed to create {}: {e}", root.display()))
            })?;
        }
        if !root.is_dir() {
            return Err(SundialError::storage(format!(
                "object root is not a directory: {}",
                root.display()
            )));
        }

        Ok(LocalObjectStore {
            root,
            sync_writes: config.sync_writes,
            fetcher: ParallelFetcher::new(config.fetch_parallelism)?,
        })
    }

    /// Directory holding the buckets.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    fn object_path(&self, bucket: &str, path: &str) -> PathBuf {
        path.split('/')
            .fold(self.bucket_dir(bucket), |acc, segment| acc.join(segment))
    }

    fn require_bucket(&self, bucket: &str) -> Result<PathBuf> {
        let dir = self.bucket_dir(bucket);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(SundialError::BucketNotFound(bucket.to_string()))
        }
    }

    fn open_object(&self, bucket: &str, path: &str) -> Result<File> {
        validate_location(bucket, path)?;
        self.require_bucket(bucket)?;
        File::open(self.object_path(bucket, path)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SundialError::object_not_found(bucket, path),
            _ => SundialError::storage(format!("failed to open {bucket}/{path}: {e}")),
        })
    }

    fn collect_objects(
        &self,
        bucket: &str,
        dir: &Path,
        relative: &str,
        prefix: &str,
        out: &mut Vec<ObjectMeta>,
    ) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }
            let path = if relative.is_empty() {
                name.to_string()
            } else {
                format!("{relative}/{name}")
            };
            // Prune directories that cannot contain a match.
            if !path.starts_with(prefix) && !prefix.starts_with(&path) {
                continue;
            }

            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.collect_objects(bucket, &entry.path(), &path, prefix, out)?;
            } else if file_type.is_file() && path.starts_with(prefix) {
                let metadata = entry.metadata()?;
                out.push(ObjectMeta {
                    bucket: bucket.to_string(),
                    path,
                    size: metadata.len(),
                    modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                });
            }
        }
        Ok(())
    }
}

impl ObjectStore for LocalObjectStore {
    fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        validate_bucket(bucket)?;
        Ok(self.bucket_dir(bucket).is_dir())
    }

    fn create_bucket(&self, bucket: &str) -> Result<()> {
        validate_bucket(bucket)?;
        fs::create_dir_all(self.bucket_dir(bucket))
            .map_err(|e| SundialError::storage(format!("failed to create bucket {bucket}: {e}")))
    }

    fn put(&self, bucket: &str, path: &str, data: &[u8]) -> Result<()> {
        validate_location(bucket, path)?;
        self.require_bucket(bucket)?;

        let target = self.object_path(bucket, path);
        let parent = target
            .parent()
            .ok_or_else(|| SundialError::invalid_argument(format!("no parent for {path}")))?;
        fs::create_dir_all(parent)?;

        let file_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("object");
        let temp = parent.join(format!("{TEMP_PREFIX}{}-{file_name}", uuid::Uuid::new_v4()));

        let write = || -> std::io::Result<()> {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp)?;
            file.write_all(data)?;
            if self.sync_writes {
                file.sync_all()?;
            }
            fs::rename(&temp, &target)
        };

        if let Err(e) = write() {
            error!("put {bucket}/{path} failed: {e}");
            let _ = fs::remove_file(&temp);
            return Err(SundialError::storage(format!(
                "failed to write {bucket}/{path}: {e}"
            )));
        }

        debug!("put {bucket}/{path} ({} bytes)", data.len());
        Ok(())
    }

    fn head(&self, bucket: &str, path: &str) -> Result<ObjectMeta> {
        let metadata = self.open_object(bucket, path)?.metadata()?;
        Ok(ObjectMeta {
            bucket: bucket.to_string(),
            path: path.to_string(),
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    fn get_range(&self, bucket: &str, path: &str, range: Range<u64>) -> Result<Vec<u8>> {
        if range.start > range.end {
            return Err(SundialError::invalid_argument(format!(
                "inverted range {range:?}"
            )));
        }
        let mut file = self.open_object(bucket, path)?;
        file.seek(SeekFrom::Start(range.start))?;

        let mut buffer = vec![0u8; (range.end - range.start) as usize];
        file.read_exact(&mut buffer).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => SundialError::invalid_argument(format!(
                "range {range:?} outside {bucket}/{path}"
            )),
            _ => SundialError::from(e),
        })?;
        Ok(buffer)
    }

    fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        self.fetcher.fetch(self, bucket, path)
    }

    fn delete(&self, bucket: &str, path: &str) -> Result<()> {
        validate_location(bucket, path)?;
        self.require_bucket(bucket)?;
        match fs::remove_file(self.object_path(bucket, path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SundialError::storage(format!(
                "failed to delete {bucket}/{path}: {e}"
            ))),
        }
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>> {
        validate_bucket(bucket)?;
        let dir = self.require_bucket(bucket)?;

        let mut objects = Vec::new();
        self.collect_objects(bucket, &dir, "", prefix, &mut objects)?;
        objects.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(objects)
    }
}
