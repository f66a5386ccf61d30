//! Maximal marginal relevance selection.
//!
//! Greedy: take the best remaining result, then penalize every other
//! remaining result by `similarity × coefficient` to the one just taken and
//! re-sort. Penalties accumulate in `diversity_penalty` and are subtracted
//! from `final`. Exact ties resolve by ascending id.

use crate::capability::PairwiseSimilarity;
use crate::fusion::sort_by_final;
use nexus_core::model::{Candidate, RankedResult};
use nexus_core::vector::cosine_similarity;

/// Pairwise similarity for two titles when embeddings are unavailable.
pub const SAME_TITLE_SIMILARITY: f32 = 0.9;
pub const DIFFERENT_TITLE_SIMILARITY: f32 = 0.1;

/// Title equality only: `0.9` for the same title, `0.1` otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleSimilarity;

impl TitleSimilarity {
    #[must_use]
    pub fn titles(left: &str, right: &str) -> f32 {
        if left.trim().eq_ignore_ascii_case(right.trim()) {
            SAME_TITLE_SIMILARITY
        } else {
            DIFFERENT_TITLE_SIMILARITY
        }
    }
}

impl PairwiseSimilarity for TitleSimilarity {
    fn similarity(&self, left: &Candidate, right: &Candidate) -> f32 {
        Self::titles(&left.title, &right.title)
    }
}

/// Dense-embedding cosine clamped at 0, with title equality as the fallback
/// when either side has no usable embedding.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddingSimilarity;

impl PairwiseSimilarity for EmbeddingSimilarity {
    fn similarity(&self, left: &Candidate, right: &Candidate) -> f32 {
        left.embedding
            .as_deref()
            .zip(right.embedding.as_deref())
            .and_then(|(l, r)| cosine_similarity(l, r))
            .map_or_else(
                || TitleSimilarity::titles(&left.title, &right.title),
                |cosine| cosine.max(0.0),
            )
    }
}

/// Select up to `limit` results from `results` by MMR.
///
/// Returns `min(limit, results.len())` entries in selection order. The first
/// pick never carries a penalty.
#[must_use]
pub fn mmr_select(
    mut results: Vec<RankedResult>,
    limit: usize,
    coefficient: f32,
    similarity: &dyn PairwiseSimilarity,
) -> Vec<RankedResult> {
    sort_by_final(&mut results);
    let mut selected = Vec::with_capacity(limit.min(results.len()));

    while selected.len() < limit && !results.is_empty() {
        let chosen = results.remove(0);
        for other in &mut results {
            let penalty = unit(similarity.similarity(&chosen.candidate, &other.candidate))
                * coefficient;
            other.scores.diversity_penalty += penalty;
            other.scores.final_score -= penalty;
        }
        selected.push(chosen);
        sort_by_final(&mut results);
    }

    selected
}

fn unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
