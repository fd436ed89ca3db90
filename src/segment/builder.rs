//! Accumulates documents into a [`Segment`].

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;
use serde_json::Value;

use crate::error::{Result, SundialError};
use crate::meta::{FieldType, Index};
use crate::segment::dictionary::{PostingLocator, TermDictionary};
use crate::segment::snapshot::{FieldSegment, Segment};
use crate::segment::terms::field_terms;
use crate::util::varint::write_u64;

/// In-memory inverted index for one segment under construction.
///
/// Document ids are assigned sequentially from zero. A document that fails
/// to index leaves the builder unchanged.
#[derive(Debug)]
pub struct SegmentBuilder {
    schema: BTreeMap<String, FieldType>,
    inverted: BTreeMap<String, BTreeMap<Vec<u8>, Vec<u32>>>,
    next_doc_id: u32,
}

impl SegmentBuilder {
    pub fn new(schema: BTreeMap<String, FieldType>) -> Self {
        let inverted = schema
            .keys()
            .map(|field| (field.clone(), BTreeMap::new()))
            .collect();
        SegmentBuilder {
            schema,
            inverted,
            next_doc_id: 0,
        }
    }

    /// Builder over the mappings of `index`.
    pub fn for_index(index: &Index) -> Result<Self> {
        Ok(Self::new(index.field_types()?))
    }

    pub fn doc_count(&self) -> u32 {
        self.next_doc_id
    }

    /// Index one JSON object and return its document id.
    ///
    /// Fields missing from the schema are ignored.
    pub fn add_document(&mut self, document: &Value) -> Result<u32> {
        let Value::Object(object) = document else {
            return Err(SundialError::invalid_argument(
                "documents must be JSON objects",
            ));
        };
        let doc_id = self.next_doc_id;
        if doc_id == u32::MAX {
            return Err(SundialError::invalid_argument("segment document limit reached"));
        }

        let mut pending = Vec::with_capacity(self.schema.len());
        for (field, field_type) in &self.schema {
            let Some(value) = object.get(field) else {
                continue;
            };
            let mut terms = Vec::new();
            field_terms(field, *field_type, value, &mut terms)?;
            pending.push((field, terms));
        }

        for (field, terms) in pending {
            let Some(dictionary) = self.inverted.get_mut(field) else {
                continue;
            };
            for term in terms {
                let postings = dictionary.entry(term).or_default();
                if postings.last() != Some(&doc_id) {
                    postings.push(doc_id);
                }
            }
        }

        self.next_doc_id += 1;
        Ok(doc_id)
    }

    /// Freeze the accumulated postings into a segment.
    ///
    /// Every mapped field gets a dictionary, empty if no document set it.
    pub fn build(self) -> Segment {
        let mut postings = Vec::new();
        let mut fields = BTreeMap::new();

        for (field, terms) in self.inverted {
            let mut locators = BTreeMap::new();
            for (term, doc_ids) in terms {
                let offset = postings.len() as u64;
                let mut previous = 0;
                for doc_id in &doc_ids {
                    // Writing into a Vec cannot fail.
                    let _ = write_u64(&mut postings, u64::from(doc_id - previous));
                    previous = *doc_id;
                }
                let length = postings.len() as u64 - offset;
                locators.insert(
                    term,
                    PostingLocator::new(offset, length, doc_ids.len() as u64),
                );
            }

            let field_type = self.schema[&field];
            fields.insert(
                field,
                FieldSegment {
                    field_type,
                    dictionary: Arc::new(TermDictionary::from_map(locators)),
                },
            );
        }

        let segment = Segment {
            id: uuid::Uuid::new_v4().to_string(),
            doc_count: self.next_doc_id,
            fields,
            postings,
        };
        debug!(
            "built segment {} with {} docs over {} fields",
            segment.id,
            segment.doc_count,
            segment.fields.len()
        );
        segment
    }
}
