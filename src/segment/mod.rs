//! Immutable segments and their per-field term dictionaries.
//!
//! Documents go through a [`SegmentBuilder`] into a [`Segment`], which can be
//! encoded into a blob, persisted to an object store and reopened with a
//! [`SegmentReader`]. Readers hand out [`DictionaryIterator`]s for ordered
//! range, prefix and pattern scans over one field's terms.

pub mod builder;
pub mod codec;
pub mod dictionary;
pub mod matcher;
pub mod reader;
pub mod snapshot;
pub mod terms;

pub use builder::SegmentBuilder;
pub use codec::{SEGMENT_MAGIC, SEGMENT_VERSION};
pub use dictionary::{
    DictionaryIterator, PostingLocator, TermDictionary, TermEntry, prefix_bounds,
};
pub use matcher::{FuzzyMatcher, RegexMatcher, TermMatcher};
pub use reader::SegmentReader;
pub use snapshot::{FieldSegment, Segment};
