//! Read access to an immutable segment snapshot.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;

use crate::error::{Result, SundialError};
use crate::meta::FieldType;
use crate::segment::dictionary::{DictionaryIterator, PostingLocator};
use crate::segment::matcher::TermMatcher;
use crate::segment::snapshot::{FieldSegment, Segment};
use crate::storage::ObjectStore;

/// Shared handle on a segment.
///
/// Iterators opened from a reader keep their own reference to the field
/// dictionary, so they stay valid after the reader is closed; only new
/// operations on the reader fail.
#[derive(Debug)]
pub struct SegmentReader {
    segment: Arc<Segment>,
    closed: AtomicBool,
}

impl SegmentReader {
    pub fn new(segment: Arc<Segment>) -> Self {
        SegmentReader {
            segment,
            closed: AtomicBool::new(false),
        }
    }

    /// Decode a segment blob held in memory.
    pub fn open_bytes(data: &[u8]) -> Result<Self> {
        Ok(Self::new(Arc::new(Segment::decode(data)?)))
    }

    /// Fetch a segment blob from `store` and open it.
    pub fn open_from_store(store: &dyn ObjectStore, bucket: &str, path: &str) -> Result<Self> {
        let segment = Segment::load(store, bucket, path)?;
        debug!("opened segment {} from {bucket}/{path}", segment.id());
        Ok(Self::new(Arc::new(segment)))
    }

    pub fn segment(&self) -> &Arc<Segment> {
        &self.segment
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(SundialError::ReaderClosed)
        } else {
            Ok(())
        }
    }

    fn field(&self, field: &str) -> Result<&FieldSegment> {
        self.check_open()?;
        self.segment
            .field(field)
            .ok_or_else(|| SundialError::field_not_found(field))
    }

    /// Open an ordered scan over the terms `t` of `field` with
    /// `start <= t < end` that `matcher` accepts.
    ///
    /// `None` bounds are open. Fails with [`SundialError::FieldNotFound`] if
    /// the field is not indexed and [`SundialError::ReaderClosed`] after
    /// [`close`](Self::close).
    pub fn dictionary_iterator(
        &self,
        field: &str,
        matcher: Option<Arc<dyn TermMatcher>>,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<DictionaryIterator> {
        let field = self.field(field)?;
        Ok(DictionaryIterator::new(
            field.dictionary.clone(),
            matcher,
            start,
            end,
        ))
    }

    /// Posting locator of an exact term, `Ok(None)` if absent.
    pub fn term_info(&self, field: &str, term: &[u8]) -> Result<Option<PostingLocator>> {
        Ok(self.field(field)?.dictionary.get(term))
    }

    /// Document ids of a posting list.
    pub fn postings(&self, locator: PostingLocator) -> Result<Vec<u32>> {
        self.check_open()?;
        self.segment.postings(locator)
    }

    /// Indexed fields and their types, ordered by name.
    pub fn fields(&self) -> Result<Vec<(String, FieldType)>> {
        self.check_open()?;
        Ok(self
            .segment
            .fields()
            .map(|(name, field_type)| (name.to_string(), field_type))
            .collect())
    }

    pub fn field_type(&self, field: &str) -> Result<FieldType> {
        Ok(self.field(field)?.field_type)
    }

    pub fn term_count(&self, field: &str) -> Result<usize> {
        Ok(self.field(field)?.dictionary.len())
    }

    pub fn doc_count(&self) -> u32 {
        self.segment.doc_count()
    }
}
