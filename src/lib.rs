//! # Sundial
//!
//! Index metadata, term dictionaries and segment object storage for a
//! log and document store.
//!
//! ## Features
//!
//! - Index, alias and index template definitions with typed field mappings,
//!   kept in a cache over a durable key-value log
//! - Immutable segments with per-field sorted term dictionaries and ordered
//!   range, prefix, regex and fuzzy scans
//! - Pluggable object storage for segment blobs with bounded parallel fetches

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod meta;
pub mod segment;
pub mod storage;
pub mod util;

pub mod prelude {
    pub use crate::config::SundialConfig;
    pub use crate::error::{Result, SundialError};
    pub use crate::meta::{
        Alias, FieldType, FileMetaKv, FileMetaKvConfig, Index, IndexTemplate, MemoryMetaKv,
        MetaKv, MetadataStore,
    };
    pub use crate::segment::{
        DictionaryIterator, PostingLocator, Segment, SegmentBuilder, SegmentReader, TermEntry,
        TermMatcher, prefix_bounds,
    };
    pub use crate::storage::{ObjectMeta, ObjectStore, StorageConfig, StorageFactory};
    pub use crate::util::increment_bytes;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
