//! Per-field term dictionary and its range iterator.
//!
//! A [`TermDictionary`] keeps the distinct terms of one field as a sorted
//! array with a parallel array of [`PostingLocator`]s. Range bounds are
//! resolved with a binary search, after which a [`DictionaryIterator`] walks
//! the slice between them in order, applying an optional [`TermMatcher`].

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::error::{Result, SundialError};
use crate::segment::matcher::TermMatcher;
use crate::util::increment_bytes;

/// Where a term's posting list lives inside the segment's postings area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostingLocator {
    /// Byte offset into the postings area.
    pub offset: u64,
    /// Encoded length in bytes.
    pub length: u64,
    /// Number of documents containing the term.
    pub doc_freq: u64,
}

impl PostingLocator {
    pub fn new(offset: u64, length: u64, doc_freq: u64) -> Self {
        PostingLocator {
            offset,
            length,
            doc_freq,
        }
    }
}

/// One dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermEntry {
    pub term: Vec<u8>,
    pub locator: PostingLocator,
}

impl TermEntry {
    /// The term as UTF-8, if it is.
    pub fn term_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.term).ok()
    }
}

/// Sorted, immutable term table of one field.
#[derive(Debug, Clone, Default)]
pub struct TermDictionary {
    terms: Vec<Vec<u8>>,
    locators: Vec<PostingLocator>,
}

impl TermDictionary {
    /// Build from parallel arrays, checking that terms strictly increase.
    pub fn from_sorted(terms: Vec<Vec<u8>>, locators: Vec<PostingLocator>) -> Result<Self> {
        if terms.len() != locators.len() {
            return Err(SundialError::corrupted(format!(
                "{} terms but {} posting locators",
                terms.len(),
                locators.len()
            )));
        }
        if let Some(position) = terms.windows(2).position(|pair| pair[0] >= pair[1]) {
            return Err(SundialError::corrupted(format!(
                "terms out of order at position {}",
                position + 1
            )));
        }
        Ok(TermDictionary { terms, locators })
    }

    pub fn from_map(map: BTreeMap<Vec<u8>, PostingLocator>) -> Self {
        let (terms, locators) = map.into_iter().unzip();
        TermDictionary { terms, locators }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Exact lookup.
    pub fn get(&self, term: &[u8]) -> Option<PostingLocator> {
        self.terms
            .binary_search_by(|probe| probe.as_slice().cmp(term))
            .ok()
            .map(|position| self.locators[position])
    }

    pub fn term(&self, position: usize) -> Option<&[u8]> {
        self.terms.get(position).map(Vec::as_slice)
    }

    pub fn locator(&self, position: usize) -> Option<PostingLocator> {
        self.locators.get(position).copied()
    }

    pub fn terms(&self) -> impl Iterator<Item = &[u8]> {
        self.terms.iter().map(Vec::as_slice)
    }

    /// Positions of the terms `t` with `start <= t < end`.
    pub fn positions(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> Range<usize> {
        let first = start.map_or(0, |start| {
            self.terms.partition_point(|term| term.as_slice() < start)
        });
        let last = end.map_or(self.terms.len(), |end| {
            self.terms.partition_point(|term| term.as_slice() < end)
        });
        first..last.max(first)
    }
}

/// Bounds of a prefix scan: `prefix` itself and its successor.
///
/// The upper bound is `None` when every byte of the prefix is `0xFF`, in which
/// case the scan runs to the end of the dictionary.
pub fn prefix_bounds(prefix: &[u8]) -> (Vec<u8>, Option<Vec<u8>>) {
    (prefix.to_vec(), increment_bytes(prefix))
}

/// Ordered cursor over a range of one dictionary.
///
/// Holds a reference to the dictionary snapshot until it is closed or
/// dropped. Once [`close`](Self::close) has run, [`next_entry`](Self::next_entry)
/// fails with [`SundialError::IteratorClosed`].
pub struct DictionaryIterator {
    dictionary: Option<Arc<TermDictionary>>,
    matcher: Option<Arc<dyn TermMatcher>>,
    position: usize,
    end: usize,
    failed: bool,
}

impl DictionaryIterator {
    pub fn new(
        dictionary: Arc<TermDictionary>,
        matcher: Option<Arc<dyn TermMatcher>>,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Self {
        let range = dictionary.positions(start, end);
        DictionaryIterator {
            dictionary: Some(dictionary),
            matcher,
            position: range.start,
            end: range.end,
            failed: false,
        }
    }

    /// Next matching entry, `Ok(None)` once the range is exhausted.
    pub fn next_entry(&mut self) -> Result<Option<TermEntry>> {
        let dictionary = self
            .dictionary
            .as_ref()
            .ok_or(SundialError::IteratorClosed)?;

        while self.position < self.end {
            let position = self.position;
            self.position += 1;

            let term = &dictionary.terms[position];
            if self
                .matcher
                .as_ref()
                .is_none_or(|matcher| matcher.accept(term))
            {
                return Ok(Some(TermEntry {
                    term: term.clone(),
                    locator: dictionary.locators[position],
                }));
            }
        }
        Ok(None)
    }

    /// Release the dictionary snapshot. Calling this more than once is a no-op.
    pub fn close(&mut self) {
        self.dictionary = None;
        self.matcher = None;
    }

    pub fn is_closed(&self) -> bool {
        self.dictionary.is_none()
    }
}

impl Iterator for DictionaryIterator {
    type Item = Result<TermEntry>;

    /// Yields an error at most once, then ends.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let next = self.next_entry().transpose();
        if matches!(next, Some(Err(_))) {
            self.failed = true;
        }
        next
    }
}

impl fmt::Debug for DictionaryIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictionaryIterator")
            .field("position", &self.position)
            .field("end", &self.end)
            .field("filtered", &self.matcher.is_some())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary(terms: &[&str]) -> Arc<TermDictionary> {
        let map = terms
            .iter()
            .enumerate()
            .map(|(i, term)| (term.as_bytes().to_vec(), PostingLocator::new(i as u64, 1, 1)))
            .collect();
        Arc::new(TermDictionary::from_map(map))
    }

    fn collect(iterator: DictionaryIterator) -> Vec<String> {
        iterator
            .map(|entry| entry.unwrap().term_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_from_sorted_rejects_disorder() {
        let locators = vec![PostingLocator::default(); 2];
        assert!(
            TermDictionary::from_sorted(vec![b"b".to_vec(), b"a".to_vec()], locators.clone())
                .is_err()
        );
        assert!(
            TermDictionary::from_sorted(vec![b"a".to_vec(), b"a".to_vec()], locators.clone())
                .is_err()
        );
        assert!(TermDictionary::from_sorted(vec![b"a".to_vec()], locators).is_err());
    }

    #[test]
    fn test_range_bounds() {
        let dict = dictionary(&["eat", "more", "rice"]);
        let all = DictionaryIterator::new(dict.clone(), None, None, None);
        assert_eq!(collect(all), vec!["eat", "more", "rice"]);

        let ranged = DictionaryIterator::new(dict.clone(), None, Some(b"fun"), Some(b"nice"));
        assert_eq!(collect(ranged), vec!["more"]);

        // End is exclusive, start inclusive.
        let exact = DictionaryIterator::new(dict.clone(), None, Some(b"more"), Some(b"rice"));
        assert_eq!(collect(exact), vec!["more"]);

        let inverted = DictionaryIterator::new(dict, None, Some(b"z"), Some(b"a"));
        assert!(collect(inverted).is_empty());
    }

    #[test]
    fn test_prefix_scan_with_matcher() {
        let dict = dictionary(&["bob", "cat", "cats", "catting", "dog"]);
        let (start, end) = prefix_bounds(b"cat");
        assert_eq!(end.as_deref(), Some(&b"cau"[..]));

        let scan = DictionaryIterator::new(dict.clone(), None, Some(&start), end.as_deref());
        assert_eq!(collect(scan), vec!["cat", "cats", "catting"]);

        let short: Arc<dyn TermMatcher> = Arc::new(|term: &[u8]| term.len() <= 4);
        let filtered = DictionaryIterator::new(dict, Some(short), Some(&start), end.as_deref());
        assert_eq!(collect(filtered), vec!["cat", "cats"]);
    }

    #[test]
    fn test_close_is_idempotent() {
        let dict = dictionary(&["a", "b"]);
        let mut iterator = DictionaryIterator::new(dict.clone(), None, None, None);
        assert_eq!(iterator.next_entry().unwrap().unwrap().term, b"a");

        iterator.close();
        iterator.close();
        assert!(iterator.is_closed());
        assert!(matches!(
            iterator.next_entry(),
            Err(SundialError::IteratorClosed)
        ));
        assert_eq!(Arc::strong_count(&dict), 1);

        assert!(matches!(iterator.next(), Some(Err(SundialError::IteratorClosed))));
        assert!(iterator.next().is_none());
    }

    #[test]
    fn test_exhaustion_is_stable() {
        let dict = dictionary(&["only"]);
        let mut iterator = DictionaryIterator::new(dict, None, None, None);
        assert!(iterator.next_entry().unwrap().is_some());
        assert!(iterator.next_entry().unwrap().is_none());
        assert!(iterator.next_entry().unwrap().is_none());
    }

    #[test]
    fn test_exact_lookup() {
        let dict = dictionary(&["a", "c"]);
        assert_eq!(dict.get(b"c"), Some(PostingLocator::new(1, 1, 1)));
        assert_eq!(dict.get(b"b"), None);
    }
}
