//! Runtime configuration.
//!
//! A JSON file whose fields are all optional:
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/sundial",
//!   "metadata_file": "meta.log",
//!   "object_root": "objects",
//!   "fetch_parallelism": 8,
//!   "sync_writes": true
//! }
//! ```
//!
//! Relative `metadata_file` and `object_root` paths resolve against
//! `data_dir`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SundialError};
use crate::meta::FileMetaKvConfig;
use crate::storage::file::LocalObjectStoreConfig;

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_metadata_file() -> PathBuf {
    PathBuf::from("meta.log")
}

fn default_object_root() -> PathBuf {
    PathBuf::from("objects")
}

fn default_fetch_parallelism() -> usize {
    num_cpus::get().max(1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SundialConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_metadata_file")]
    pub metadata_file: PathBuf,

    #[serde(default = "default_object_root")]
    pub object_root: PathBuf,

    /// Concurrent range reads per object fetch.
    #[serde(default = "default_fetch_parallelism")]
    pub fetch_parallelism: usize,

    /// Fsync metadata appends and object puts.
    #[serde(default)]
    pub sync_writes: bool,
}

impl Default for SundialConfig {
    fn default() -> Self {
        SundialConfig {
            data_dir: default_data_dir(),
            metadata_file: default_metadata_file(),
            object_root: default_object_root(),
            fetch_parallelism: default_fetch_parallelism(),
            sync_writes: false,
        }
    }
}

impl SundialConfig {
    /// Read a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            SundialError::invalid_argument(format!(
                "cannot read config {}: {e}",
                path.display()
            ))
        })?;
        let config: SundialConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// [`load`](Self::load) `path` if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch_parallelism == 0 {
            return Err(SundialError::invalid_argument(
                "fetch_parallelism must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn data_dir<P: Into<PathBuf>>(mut self, data_dir: P) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn metadata_file<P: Into<PathBuf>>(mut self, metadata_file: P) -> Self {
        self.metadata_file = metadata_file.into();
        self
    }

    pub fn object_root<P: Into<PathBuf>>(mut self, object_root: P) -> Self {
        self.object_root = object_root.into();
        self
    }

    pub fn fetch_parallelism(mut self, fetch_parallelism: usize) -> Self {
        self.fetch_parallelism = fetch_parallelism;
        self
    }

    pub fn sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(&self.metadata_file)
    }

    pub fn object_root_path(&self) -> PathBuf {
        self.data_dir.join(&self.object_root)
    }

    pub fn metadata_kv_config(&self) -> FileMetaKvConfig {
        FileMetaKvConfig::new(self.metadata_path()).sync_writes(self.sync_writes)
    }

    pub fn object_store_config(&self) -> LocalObjectStoreConfig {
        LocalObjectStoreConfig {
            root: self.object_root_path(),
            sync_writes: self.sync_writes,
            fetch_parallelism: self.fetch_parallelism,
        }
    }
}
