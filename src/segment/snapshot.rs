//! Immutable in-memory segment.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::info;

use crate::error::{Result, SundialError};
use crate::meta::FieldType;
use crate::segment::dictionary::{PostingLocator, TermDictionary};
use crate::storage::ObjectStore;
use crate::util::varint::decode_u64;

/// Dictionary of one indexed field.
#[derive(Debug, Clone)]
pub struct FieldSegment {
    pub field_type: FieldType,
    pub dictionary: Arc<TermDictionary>,
}

/// A built segment: per-field dictionaries over a shared postings area.
///
/// Posting lists are sorted document ids stored as varint deltas; a
/// [`PostingLocator`] addresses one list inside [`postings_area`](Self::postings_area).
#[derive(Debug, Clone)]
pub struct Segment {
    pub(crate) id: String,
    pub(crate) doc_count: u32,
    pub(crate) fields: BTreeMap<String, FieldSegment>,
    pub(crate) postings: Vec<u8>,
}

impl Segment {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldType)> {
        self.fields
            .iter()
            .map(|(name, field)| (name.as_str(), field.field_type))
    }

    pub fn field(&self, name: &str) -> Option<&FieldSegment> {
        self.fields.get(name)
    }

    pub fn postings_area(&self) -> &[u8] {
        &self.postings
    }

    /// Decode the document ids addressed by `locator`.
    pub fn postings(&self, locator: PostingLocator) -> Result<Vec<u32>> {
        let start = usize::try_from(locator.offset).ok();
        let end = start.and_then(|start| start.checked_add(usize::try_from(locator.length).ok()?));
        let bytes = match (start, end) {
            (Some(start), Some(end)) if end <= self.postings.len() => &self.postings[start..end],
            _ => {
                return Err(SundialError::invalid_argument(format!(
                    "posting locator {locator:?} outside postings area of {} bytes",
                    self.postings.len()
                )));
            }
        };

        // Every id takes at least one byte.
        let mut doc_ids = Vec::with_capacity(locator.doc_freq.min(bytes.len() as u64) as usize);
        let mut offset = 0;
        let mut previous = 0u64;
        while offset < bytes.len() {
            let (delta, read) = decode_u64(&bytes[offset..])?;
            offset += read;
            previous = previous
                .checked_add(delta)
                .filter(|&id| id <= u64::from(u32::MAX))
                .ok_or_else(|| SundialError::corrupted("doc id overflows u32"))?;
            let doc_id = previous as u32;
            doc_ids.push(doc_id);
        }

        if doc_ids.len() as u64 != locator.doc_freq {
            return Err(SundialError::corrupted(format!(
                "posting list holds {} ids, locator says {}",
                doc_ids.len(),
                locator.doc_freq
            )));
        }
        Ok(doc_ids)
    }

    /// Encode and store the segment at `(bucket, path)`, returning its size.
    pub fn persist(&self, store: &dyn ObjectStore, bucket: &str, path: &str) -> Result<u64> {
        let bytes = self.encode();
        store.put(bucket, path, &bytes)?;
        info!(
            "persisted segment {} ({} docs, {} bytes) to {bucket}/{path}",
            self.id,
            self.doc_count,
            bytes.len()
        );
        Ok(bytes.len() as u64)
    }

    /// Fetch and decode the segment stored at `(bucket, path)`.
    pub fn load(store: &dyn ObjectStore, bucket: &str, path: &str) -> Result<Segment> {
        Segment::decode(&store.get(bucket, path)?)
    }
}
