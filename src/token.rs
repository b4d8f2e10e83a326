//! Word tokens produced when splitting a camel-case condition name.

/// A capitalized word of a camel-case identifier, with its location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Word<'a> {
    pub text: &'a str,
    pub span: Span,
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Re-joins words into an UpperCamel identifier.
pub fn join_words(words: &[Word<'_>]) -> String {
    words.iter().map(|w| w.text).collect()
}

/// Lowercases the first character: `AuthorName` -> `authorName`.
pub fn lcfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_helpers() {
        assert_eq!(lcfirst("AuthorName"), "authorName");
        assert_eq!(lcfirst(""), "");
    }
}
