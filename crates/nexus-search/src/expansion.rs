//! Query preprocessing: normalization and domain-keyword expansion.

use nexus_core::config::{DomainKeywords, ExpansionConfig};
use nexus_core::model::QueryContext;

/// Shortest query that may match as a fragment of a domain name.
const MIN_FRAGMENT_LEN: usize = 4;

/// Result of preprocessing one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preprocessed {
    pub normalized: String,
    /// Set only when expansion was requested and a domain matched.
    pub expanded: Option<String>,
    pub context: QueryContext,
}

impl Preprocessed {
    #[must_use]
    pub fn text(&self) -> &str {
        self.expanded.as_deref().unwrap_or(&self.normalized)
    }

    /// Number of terms added by expansion.
    #[must_use]
    pub fn added_terms(&self) -> usize {
        self.expanded.as_ref().map_or(0, |expanded| {
            expanded.split_whitespace().count() - self.normalized.split_whitespace().count()
        })
    }
}

/// Looks queries up in an ordered domain table.
#[derive(Debug, Clone)]
pub struct QueryPreprocessor {
    domains: Vec<DomainKeywords>,
    max_terms: usize,
}

impl QueryPreprocessor {
    #[must_use]
    pub fn new(domains: Vec<DomainKeywords>, max_terms: usize) -> Self {
        Self { domains, max_terms }
    }

    #[must_use]
    pub fn from_config(config: &ExpansionConfig) -> Self {
        Self::new(config.domain_table(), config.max_terms)
    }

    /// First domain whose name matches `query`, case-insensitively.
    ///
    /// A domain matches when the query contains its name, or when a query of
    /// at least four characters is a fragment of the name ("crypto").
    #[must_use]
    pub fn match_domain(&self, query: &str) -> Option<&DomainKeywords> {
        let query = query.to_lowercase();
        self.domains.iter().find(|domain| {
            let name = domain.name.to_lowercase();
            query.contains(&name)
                || (query.chars().count() >= MIN_FRAGMENT_LEN && name.contains(&query))
        })
    }

    /// Normalize whitespace and, when `expand` is set, append the first
    /// `max_terms` related terms of the matched domain.
    ///
    /// The domain context is inferred whether or not expansion is requested.
    #[must_use]
    pub fn preprocess(&self, raw: &str, expand: bool) -> Preprocessed {
        let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        let domain = self.match_domain(&normalized);
        let context = domain.map_or_else(QueryContext::default, |domain| {
            QueryContext::for_domain(domain.name.clone())
        });

        let expanded = domain.filter(|_| expand).and_then(|domain| {
            let terms: Vec<&str> = domain
                .terms
                .iter()
                .take(self.max_terms)
                .map(String::as_str)
                .collect();
            (!terms.is_empty()).then(|| format!("{normalized} {}", terms.join(" ")))
        });

        Preprocessed {
            normalized,
            expanded,
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::config::builtin_domains;

    fn preprocessor() -> QueryPreprocessor {
        QueryPreprocessor::new(builtin_domains(), 3)
    }

    #[test]
    fn expands_with_bounded_prefix_of_domain_terms() {
        let out = preprocessor().preprocess("  Cryptography   methods ", true);
        assert_eq!(out.normalized, "Cryptography methods");
        assert_eq!(
            out.expanded.as_deref(),
            Some("Cryptography methods encryption cryptographic zero-knowledge")
        );
        assert_eq!(out.context.domain.as_deref(), Some("Cryptography"));
        assert_eq!(out.added_terms(), 3);
    }

    #[test]
    fn no_match_returns_query_unchanged() {
        let out = preprocessor().preprocess("gardening tools", true);
        assert!(out.expanded.is_none());
        assert_eq!(out.text(), "gardening tools");
        assert_eq!(out.context, QueryContext::default());
    }

    #[test]
    fn context_is_inferred_without_expansion() {
        let out = preprocessor().preprocess("quantum computing for drugs", false);
        assert!(out.expanded.is_none());
        assert_eq!(out.context.domain.as_deref(), Some("Quantum Computing"));
    }

    #[test]
    fn short_fragments_do_not_match() {
        assert!(preprocessor().match_domain("ai").is_none());
        assert_eq!(
            preprocessor().match_domain("CRYPTO").map(|d| d.name.as_str()),
            Some("Cryptography")
        );
    }
}
