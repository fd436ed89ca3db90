//! Small helpers shared by the segment codec and the term matchers.

pub mod bytes;
pub mod levenshtein;
pub mod varint;

pub use bytes::increment_bytes;
