//! Tokenization shared by lexical matching, hashing embeddings, and
//! matched-term reporting.
//!
//! Terms are lowercased alphanumeric runs. Each term is reduced to a
//! [`term_key`] (its first eight characters), a crude prefix stemmer that lets
//! "cryptography" and "cryptographic" meet without a language-specific stemmer.

use std::collections::HashSet;

const TERM_KEY_LEN: usize = 8;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "into", "is", "it",
    "its", "of", "on", "or", "that", "the", "their", "this", "to", "via", "with", "without",
];

/// Split text into lowercase terms, dropping stopwords and single characters.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|raw| raw.chars().count() > 1)
        .map(str::to_lowercase)
        .filter(|term| !STOPWORDS.contains(&term.as_str()))
        .collect()
}

/// Unique terms of `text` in first-occurrence order.
#[must_use]
pub fn unique_terms(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|term| seen.insert(term.clone()))
        .collect()
}

/// Matching key for a term: its first eight characters.
#[must_use]
pub fn term_key(term: &str) -> String {
    term.chars().take(TERM_KEY_LEN).collect()
}

/// Set of term keys present in `text`.
#[must_use]
pub fn term_keys(text: &str) -> HashSet<String> {
    tokenize(text).iter().map(|term| term_key(term)).collect()
}

/// Query terms that occur (by term key) in any of `fields`.
///
/// Returned in query order without duplicates.
#[must_use]
pub fn matched_terms(query: &str, fields: &[&str]) -> Vec<String> {
    let keys: HashSet<String> = fields.iter().flat_map(|field| term_keys(field)).collect();
    unique_terms(query)
        .into_iter()
        .filter(|term| keys.contains(&term_key(term)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_drops_stopwords() {
        let terms = tokenize("A Zero-Knowledge Proof for the Identity");
        assert_eq!(terms, vec!["zero", "knowledge", "proof", "identity"]);
    }

    #[test]
    fn term_key_joins_inflections() {
        assert_eq!(term_key("cryptography"), term_key("cryptographic"));
        assert_eq!(term_key("ai"), "ai");
    }

    #[test]
    fn unique_terms_keeps_first_occurrence_order() {
        assert_eq!(
            unique_terms("neural network neural interface"),
            vec!["neural", "network", "interface"]
        );
    }

    #[test]
    fn matched_terms_reports_query_terms_found_in_fields() {
        let matched = matched_terms(
            "cryptography ledger quantum",
            &["Distributed Ledger System", "cryptographic proofs"],
        );
        assert_eq!(matched, vec!["cryptography", "ledger"]);
    }

    #[test]
    fn matched_terms_empty_for_unrelated_text() {
        assert!(matched_terms("vehicle", &["Neural Interface"]).is_empty());
    }
}
