//! Text analysis for Quiver.
//!
//! Analysis is deliberately small: tokenized fields are split on Unicode word
//! boundaries and lowercased, untokenized fields are indexed as a single
//! exact term. The analyzer is pluggable per factory.

use std::fmt::Debug;
use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

/// A text analyzer producing index terms from raw field text.
pub trait Analyzer: Send + Sync + Debug {
    /// Split text into index terms.
    fn analyze(&self, text: &str) -> Vec<String>;

    /// Name of the analyzer, for diagnostics.
    fn name(&self) -> &str;
}

/// Shared analyzer handle.
pub type AnalyzerRef = Arc<dyn Analyzer>;

/// Standard analyzer: Unicode word segmentation plus lowercasing.
#[derive(Debug, Clone, Default)]
pub struct StandardAnalyzer;

impl StandardAnalyzer {
    /// Create a new standard analyzer.
    pub fn new() -> Self {
        StandardAnalyzer
    }
}

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, text: &str) -> Vec<String> {
        text.unicode_words().map(|w| w.to_lowercase()).collect()
    }

    fn name(&self) -> &str {
        "standard"
    }
}

/// Keyword analyzer: the whole input is one exact term.
///
/// Used for identifier and discriminator fields where exact-match lookups
/// must round-trip unchanged.
#[derive(Debug, Clone, Default)]
pub struct KeywordAnalyzer;

impl KeywordAnalyzer {
    /// Create a new keyword analyzer.
    pub fn new() -> Self {
        KeywordAnalyzer
    }
}

impl Analyzer for KeywordAnalyzer {
    fn analyze(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            Vec::new()
        } else {
            vec![text.to_string()]
        }
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_analyzer_lowercases_and_splits() {
        let analyzer = StandardAnalyzer::new();
        let terms = analyzer.analyze("Hibernate in Action");
        assert_eq!(terms, vec!["hibernate", "in", "action"]);
    }

    #[test]
    fn test_standard_analyzer_punctuation() {
        let analyzer = StandardAnalyzer::new();
        let terms = analyzer.analyze("Object/relational mapping, with EJB3!");
        assert_eq!(terms, vec!["object", "relational", "mapping", "with", "ejb3"]);
    }

    #[test]
    fn test_keyword_analyzer_is_exact() {
        let analyzer = KeywordAnalyzer::new();
        assert_eq!(
            analyzer.analyze("org.example.Book"),
            vec!["org.example.Book"]
        );
        assert!(analyzer.analyze("").is_empty());
    }
}
