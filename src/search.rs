//! Query-to-caption matching.
//!
//! A query compiles into a set of literal tokens that must all appear
//! somewhere in a caption, in any order, case-insensitively. Matching is a
//! plain substring loop rather than a compiled expression, so user input can
//! never inject pattern syntax or trigger pathological backtracking.

use crate::normalize::STOPWORDS;

/// Raised when a query contains nothing searchable after cleaning.
/// Surfaced to the user as a "please enter a valid name" reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("query is empty after cleaning")]
pub struct EmptyQuery;

/// The compiled conjunctive multi-token matching rule for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    tokens: Vec<String>,
    text: String,
}

impl Pattern {
    /// Cleans the query and compiles it into a pattern.
    ///
    /// Non-word, non-space characters are stripped, whitespace collapsed and
    /// stopword-like filler terms dropped. The surviving cleaned text is kept
    /// for display, so it can round-trip through a rendered result message.
    pub fn build(query: &str) -> Result<Self, EmptyQuery> {
        let cleaned: String = query
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
            .collect();
        let words: Vec<&str> = cleaned
            .split_whitespace()
            .filter(|word| !STOPWORDS.iter().any(|stop| word.eq_ignore_ascii_case(stop)))
            .collect();
        if words.is_empty() {
            return Err(EmptyQuery);
        }
        let text = words.join(" ");
        let tokens = words.iter().map(|word| word.to_lowercase()).collect();
        Ok(Self { tokens, text })
    }

    /// True when every token appears somewhere in the caption.
    pub fn matches(&self, caption: &str) -> bool {
        let haystack = caption.to_lowercase();
        self.tokens.iter().all(|token| haystack.contains(token.as_str()))
    }

    /// The cleaned query text as shown to the user.
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matching<'a>(captions: &[&'a str], query: &str) -> Vec<&'a str> {
        let pattern = Pattern::build(query).expect("valid query");
        captions.iter().copied().filter(|c| pattern.matches(c)).collect()
    }

    const CAPTIONS: &[&str] = &["The Great Escape 1963", "Great Wall 2016", "Escape Room"];

    #[test]
    fn all_tokens_must_match() {
        assert_eq!(matching(CAPTIONS, "great escape"), vec!["The Great Escape 1963"]);
    }

    #[test]
    fn single_token_matches_every_containing_caption() {
        assert_eq!(matching(CAPTIONS, "escape"), vec!["The Great Escape 1963", "Escape Room"]);
    }

    #[test]
    fn token_order_is_irrelevant() {
        assert_eq!(matching(CAPTIONS, "escape great"), vec!["The Great Escape 1963"]);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(matching(CAPTIONS, "GREAT ESCAPE"), vec!["The Great Escape 1963"]);
    }

    #[test]
    fn metacharacters_are_treated_literally() {
        let pattern = Pattern::build("great (escape) .*").expect("valid query");
        assert_eq!(pattern.text(), "great escape");
        assert!(pattern.matches("The Great Escape 1963"));
        assert!(!pattern.matches("Great Wall 2016"));
    }

    #[test]
    fn empty_query_is_rejected() {
        assert_eq!(Pattern::build(""), Err(EmptyQuery));
        assert_eq!(Pattern::build("   !!! ... "), Err(EmptyQuery));
    }

    #[test]
    fn stopword_only_query_is_rejected() {
        assert_eq!(Pattern::build("movies webseries"), Err(EmptyQuery));
    }

    #[test]
    fn stopwords_are_ignored_inside_queries() {
        assert_eq!(matching(CAPTIONS, "escape movies"), vec!["The Great Escape 1963", "Escape Room"]);
    }
}
