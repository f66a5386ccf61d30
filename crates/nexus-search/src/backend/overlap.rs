use crate::capability::CoherenceJudge;
use anyhow::Result;
use async_trait::async_trait;
use nexus_core::text;

/// Offline judge: rates the share of query terms present in the candidate
/// text on a `0..=10` scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermOverlapJudge;

impl TermOverlapJudge {
    #[must_use]
    pub fn rate(query: &str, candidate_text: &str) -> f32 {
        let query_keys = text::term_keys(query);
        if query_keys.is_empty() {
            return 0.0;
        }
        let doc_keys = text::term_keys(candidate_text);
        let shared = query_keys.intersection(&doc_keys).count();
        10.0 * shared as f32 / query_keys.len() as f32
    }
}

#[async_trait]
impl CoherenceJudge for TermOverlapJudge {
    async fn score(&self, query: &str, candidate_text: &str) -> Result<f32> {
        Ok(Self::rate(query, candidate_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_is_share_of_query_terms() {
        let rating = TermOverlapJudge::rate(
            "cryptographic identity blockchain",
            "Zero-Knowledge Proof System. A cryptographic system for identity.",
        );
        assert!((rating - 10.0 * 2.0 / 3.0).abs() < 1e-5);
        assert_eq!(TermOverlapJudge::rate("the", "anything"), 0.0);
        assert_eq!(TermOverlapJudge::rate("quantum", "vehicle"), 0.0);
    }
}
