//! Index metadata: definitions, validation and the durable metadata store.

pub mod field_type;
pub mod file_kv;
pub mod kv;
pub mod store;
pub mod types;

pub use field_type::FieldType;
pub use file_kv::{FileMetaKv, FileMetaKvConfig};
pub use kv::{MemoryMetaKv, MetaKv};
pub use store::{ALIAS_PATH, INDEX_PATH, INDEX_TEMPLATE_PATH, MetadataStore};
pub use types::{Alias, Index, IndexSettings, IndexTemplate, Mappings, Property, TemplateBody};
