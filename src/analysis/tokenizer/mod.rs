//! Tokenizer implementations for text analysis.

/// Trait for tokenizers that split text into words.
pub trait Tokenizer: Send + Sync + std::fmt::Debug {
    /// Split `text` into tokens, in order of appearance. Duplicates are kept.
    fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str>;
}

pub mod unicode_word;
pub mod whole;

pub use unicode_word::UnicodeWordTokenizer;
pub use whole::WholeTokenizer;
