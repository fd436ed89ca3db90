//! Term filters applied during dictionary scans.

use regex::bytes::Regex;

use crate::error::{Result, SundialError};
use crate::util::levenshtein::levenshtein_distance_threshold;

/// Predicate deciding whether a term in range is yielded.
pub trait TermMatcher: Send + Sync {
    fn accept(&self, term: &[u8]) -> bool;
}

impl<F> TermMatcher for F
where
    F: Fn(&[u8]) -> bool + Send + Sync,
{
    fn accept(&self, term: &[u8]) -> bool {
        self(term)
    }
}

/// Accepts terms the whole of which match a regular expression.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            SundialError::invalid_argument(format!("invalid term pattern '{pattern}': {e}"))
        })?;
        Ok(RegexMatcher { regex })
    }
}

impl TermMatcher for RegexMatcher {
    fn accept(&self, term: &[u8]) -> bool {
        self.regex.is_match(term)
    }
}

/// Accepts terms within a Levenshtein distance of a target.
///
/// Terms that are not valid UTF-8 never match.
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    target: String,
    max_edits: usize,
}

impl FuzzyMatcher {
    pub fn new(target: impl Into<String>, max_edits: usize) -> Self {
        FuzzyMatcher {
            target: target.into(),
            max_edits,
        }
    }
}

impl TermMatcher for FuzzyMatcher {
    fn accept(&self, term: &[u8]) -> bool {
        std::str::from_utf8(term).is_ok_and(|term| {
            levenshtein_distance_threshold(&self.target, term, self.max_edits).is_some()
        })
    }
}
