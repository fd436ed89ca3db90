//! Error types for sundial.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`SundialError`] enum. Lookups that may legitimately find nothing (for
//! example [`MetadataStore::get_index`](crate::meta::MetadataStore::get_index))
//! return `Ok(None)` instead of an error.
//!
//! # Examples
//!
//! ```
//! use sundial::error::{Result, SundialError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(SundialError::invalid_argument("bucket name must not be empty"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for sundial operations.
#[derive(Error, Debug)]
pub enum SundialError {
    /// I/O errors (file operations, network, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A definition was rejected by schema validation.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Durable store or object store failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The requested object does not exist.
    #[error("Object not found: {bucket}/{path}")]
    ObjectNotFound { bucket: String, path: String },

    /// The requested bucket does not exist.
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    /// The field is not indexed in the segment.
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// A dictionary iterator was used after `close`.
    #[error("Iterator closed")]
    IteratorClosed,

    /// A segment reader was used after `close`.
    #[error("Reader closed")]
    ReaderClosed,

    /// The metadata store was used after `close`.
    #[error("Metadata store closed")]
    StoreClosed,

    /// Persisted bytes failed an integrity check.
    #[error("Corrupted data: {0}")]
    Corrupted(String),

    /// Invalid argument supplied by the caller.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with SundialError.
pub type Result<T> = std::result::Result<T, SundialError>;

impl SundialError {
    /// Create a new schema error.
    pub fn schema<S: Into<String>>(msg: S) -> Self {
        SundialError::Schema(msg.into())
    }

    /// Create a schema error for a field whose declared type was rejected.
    pub fn invalid_field_type(field: &str, rejected: &str) -> Self {
        SundialError::Schema(format!(
            "field '{field}' has unsupported type '{rejected}'"
        ))
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        SundialError::Storage(msg.into())
    }

    /// Create a new object-not-found error.
    pub fn object_not_found(bucket: &str, path: &str) -> Self {
        SundialError::ObjectNotFound {
            bucket: bucket.to_string(),
            path: path.to_string(),
        }
    }

    /// Create a new field-not-found error.
    pub fn field_not_found<S: Into<String>>(field: S) -> Self {
        SundialError::FieldNotFound(field.into())
    }

    /// Create a new corruption error.
    pub fn corrupted<S: Into<String>>(msg: S) -> Self {
        SundialError::Corrupted(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        SundialError::InvalidArgument(msg.into())
    }

    /// Whether this error means the addressed object or bucket is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SundialError::ObjectNotFound { .. } | SundialError::BucketNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = SundialError::schema("mappings must not be empty");
        assert_eq!(error.to_string(), "Schema error: mappings must not be empty");

        let error = SundialError::invalid_field_type("age", "int");
        assert_eq!(
            error.to_string(),
            "Schema error: field 'age' has unsupported type 'int'"
        );

        let error = SundialError::object_not_found("segments", "a/b.seg");
        assert_eq!(error.to_string(), "Object not found: segments/a/b.seg");
        assert!(error.is_not_found());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let sundial_error = SundialError::from(io_error);

        match sundial_error {
            SundialError::Io(_) => {} // Expected
            _ => panic!("Expected IO error variant"),
        }
        assert!(!SundialError::IteratorClosed.is_not_found());
    }
}
