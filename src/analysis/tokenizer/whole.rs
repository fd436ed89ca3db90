//! Whole tokenizer implementation.

use super::Tokenizer;

/// A tokenizer that treats the entire input as a single token.
///
/// Used for `keyword` fields, where the value is matched verbatim.
#[derive(Clone, Debug, Default)]
pub struct WholeTokenizer;

impl WholeTokenizer {
    /// Create a new whole tokenizer.
    pub fn new() -> Self {
        WholeTokenizer
    }
}

impl Tokenizer for WholeTokenizer {
    fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str> {
        if text.is_empty() {
            Vec::new()
        } else {
            vec![text]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_tokenizer() {
        let tokenizer = WholeTokenizer::new();
        assert_eq!(tokenizer.tokenize("hello world"), vec!["hello world"]);
        assert!(tokenizer.tokenize("").is_empty());
    }
}
