//! Text analysis: turning field values into indexable words.
//!
//! Only tokenization lives here. Which tokenizer a field uses follows from
//! its mapped [`FieldType`](crate::meta::FieldType): `text` fields split on
//! Unicode word boundaries, `keyword` fields keep the whole value.

pub mod tokenizer;

pub use tokenizer::*;
