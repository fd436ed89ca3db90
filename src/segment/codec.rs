//! Binary segment format.
//!
//! ```text
//! magic u32 | version u8 | id string | doc_count u32 | field_count varint
//! per field:  name string | type u8 | term_count varint
//!   per term: shared varint | suffix bytes | offset varint | length varint | doc_freq varint
//! postings bytes
//! crc32 u32
//! ```
//!
//! Terms are front coded against their predecessor. Integers are little
//! endian, strings and byte strings are varint length prefixed.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Result, SundialError};
use crate::meta::FieldType;
use crate::segment::dictionary::{PostingLocator, TermDictionary};
use crate::segment::snapshot::{FieldSegment, Segment};
use crate::storage::structured::{StructReader, StructWriter};

/// "SDS1" read as a little-endian u32.
pub const SEGMENT_MAGIC: u32 = 0x3153_4453;
pub const SEGMENT_VERSION: u8 = 1;

fn shared_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

impl Segment {
    /// Serialize into a checksummed blob.
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = StructWriter::with_capacity(self.postings.len() + 64);
        writer.write_u32(SEGMENT_MAGIC);
        writer.write_u8(SEGMENT_VERSION);
        writer.write_string(&self.id);
        writer.write_u32(self.doc_count);
        writer.write_varint(self.fields.len() as u64);

        for (name, field) in &self.fields {
            writer.write_string(name);
            writer.write_u8(field.field_type.code());

            let dictionary = &field.dictionary;
            writer.write_varint(dictionary.len() as u64);
            let mut previous: &[u8] = &[];
            for (position, term) in dictionary.terms().enumerate() {
                let shared = shared_prefix_len(previous, term);
                writer.write_varint(shared as u64);
                writer.write_bytes(&term[shared..]);

                let locator = dictionary.locator(position).unwrap_or_default();
                writer.write_varint(locator.offset);
                writer.write_varint(locator.length);
                writer.write_varint(locator.doc_freq);
                previous = term;
            }
        }

        writer.write_bytes(&self.postings);
        writer.finish()
    }

    /// Parse a blob written by [`encode`](Self::encode).
    ///
    /// Fails with [`SundialError::Corrupted`] on a checksum mismatch, an
    /// unknown magic or version, out-of-order terms, a posting locator
    /// outside the postings area or one claiming more ids than bytes.
    pub fn decode(data: &[u8]) -> Result<Segment> {
        let mut reader = StructReader::new(data)?;
        reader.verify()?;

        let magic = reader.read_u32()?;
        if magic != SEGMENT_MAGIC {
            return Err(SundialError::corrupted(format!(
                "bad segment magic {magic:#010x}"
            )));
        }
        let version = reader.read_u8()?;
        if version != SEGMENT_VERSION {
            return Err(SundialError::corrupted(format!(
                "unsupported segment version {version}"
            )));
        }

        let id = reader.read_string()?;
        let doc_count = reader.read_u32()?;
        let field_count = reader.read_varint()?;

        let mut raw_fields = Vec::new();
        for _ in 0..field_count {
            let name = reader.read_string()?;
            let code = reader.read_u8()?;
            let field_type = FieldType::from_code(code).ok_or_else(|| {
                SundialError::corrupted(format!("unknown field type code {code} for '{name}'"))
            })?;

            let term_count = reader.read_varint()?;
            // Each term takes at least five bytes, which bounds the preallocation.
            let capacity = term_count.min(reader.remaining() / 5) as usize;
            let mut terms: Vec<Vec<u8>> = Vec::with_capacity(capacity);
            let mut locators = Vec::with_capacity(capacity);
            for _ in 0..term_count {
                let shared = reader.read_varint()? as usize;
                let suffix = reader.read_bytes()?;
                let previous = terms.last().map_or(&[][..], Vec::as_slice);
                if shared > previous.len() {
                    return Err(SundialError::corrupted(format!(
                        "shared prefix {shared} longer than previous term in '{name}'"
                    )));
                }
                let mut term = Vec::with_capacity(shared + suffix.len());
                term.extend_from_slice(&previous[..shared]);
                term.extend_from_slice(&suffix);
                terms.push(term);

                locators.push(PostingLocator::new(
                    reader.read_varint()?,
                    reader.read_varint()?,
                    reader.read_varint()?,
                ));
            }

            raw_fields.push((name, field_type, terms, locators));
        }

        let postings = reader.read_bytes()?;
        if !reader.is_eof() {
            return Err(SundialError::corrupted(format!(
                "{} trailing bytes after postings",
                reader.remaining()
            )));
        }

        let mut fields = BTreeMap::new();
        for (name, field_type, terms, locators) in raw_fields {
            if let Some(locator) = locators.iter().find(|locator| {
                locator.doc_freq > locator.length
                    || locator
                        .offset
                        .checked_add(locator.length)
                        .is_none_or(|end| end > postings.len() as u64)
            }) {
                return Err(SundialError::corrupted(format!(
                    "posting locator {locator:?} in '{name}' outside postings area"
                )));
            }
            let dictionary = TermDictionary::from_sorted(terms, locators)
                .map_err(|e| SundialError::corrupted(format!("field '{name}': {e}")))?;
            let field = FieldSegment {
                field_type,
                dictionary: Arc::new(dictionary),
            };
            if fields.insert(name.clone(), field).is_some() {
                return Err(SundialError::corrupted(format!("duplicate field '{name}'")));
            }
        }

        Ok(Segment {
            id,
            doc_count,
            fields,
            postings,
        })
    }
}
