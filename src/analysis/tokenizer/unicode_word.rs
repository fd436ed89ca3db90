//! Unicode word tokenizer implementation.
//!
//! Splits text using the Unicode word boundary rules (UAX #29) and drops
//! segments without any alphanumeric character, such as punctuation and
//! whitespace.
//!
//! # Examples
//!
//! ```
//! use sundial::analysis::tokenizer::{Tokenizer, UnicodeWordTokenizer};
//!
//! let tokenizer = UnicodeWordTokenizer::new();
//! assert_eq!(tokenizer.tokenize("Hello, world!"), vec!["Hello", "world"]);
//! ```

use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::tokenizer::Tokenizer;

/// A tokenizer that splits text on Unicode word boundaries.
#[derive(Clone, Debug, Default)]
pub struct UnicodeWordTokenizer;

impl UnicodeWordTokenizer {
    /// Create a new Unicode word tokenizer.
    pub fn new() -> Self {
        UnicodeWordTokenizer
    }
}

impl Tokenizer for UnicodeWordTokenizer {
    fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str> {
        text.split_word_bounds()
            .filter(|word| word.chars().any(char::is_alphanumeric))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicode_word_tokenizer() {
        let tokenizer = UnicodeWordTokenizer::new();
        assert_eq!(
            tokenizer.tokenize("bob cat cats catting dog doggy zoo"),
            vec!["bob", "cat", "cats", "catting", "dog", "doggy", "zoo"]
        );
        assert_eq!(tokenizer.tokenize("café, résumé."), vec!["café", "résumé"]);
    }

    #[test]
    fn test_punctuation_only() {
        let tokenizer = UnicodeWordTokenizer::new();
        assert!(tokenizer.tokenize(" ,.!? ").is_empty());
    }
}
