//! Weight combination: semantic threshold filter and weighted signal sum.
//!
//! The combined relevance is `Σ weight × signal` with the weights of the
//! applied profile, taken as given. How the profile was chosen (named,
//! configured, or learned per context) is not this module's concern.

use nexus_core::model::{
    Candidate, DebugTrace, RankedResult, ScoreVector, Signal, SignalFallback, SignalOutcome,
    WeightProfile,
};
use tracing::warn;

/// One candidate's resolved signals, ready to combine.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalInput {
    pub candidate: Candidate,
    pub scores: ScoreVector,
    pub fallbacks: Vec<SignalFallback>,
}

impl SignalInput {
    #[must_use]
    pub fn new(candidate: Candidate, scores: ScoreVector) -> Self {
        Self {
            candidate,
            scores,
            fallbacks: Vec::new(),
        }
    }

    /// Resolve `outcome` into `signal`, falling back to `fallback` when degraded.
    pub fn resolve(&mut self, signal: Signal, outcome: &SignalOutcome, fallback: f32) {
        self.scores.set(signal, outcome.resolve(fallback));
        if let Some(reason) = outcome.degradation_reason() {
            warn!(
                candidate = %self.candidate.id,
                signal = %signal,
                reason = %reason,
                fallback,
                "signal fell back"
            );
            self.fallbacks.push(SignalFallback {
                signal,
                reason,
                value: fallback,
            });
        }
    }
}

/// Combines resolved signals under one weight profile.
#[derive(Debug, Clone)]
pub struct WeightCombiner {
    profile: WeightProfile,
    threshold: Option<f32>,
    standard: WeightProfile,
    enhanced: WeightProfile,
}

impl WeightCombiner {
    #[must_use]
    pub fn new(profile: WeightProfile, threshold: Option<f32>) -> Self {
        Self {
            profile,
            threshold,
            standard: WeightProfile::standard(),
            enhanced: WeightProfile::enhanced(),
        }
    }

    #[must_use]
    pub const fn profile(&self) -> &WeightProfile {
        &self.profile
    }

    /// Whether a semantic similarity survives the hard threshold.
    #[must_use]
    pub fn passes(&self, semantic: f32) -> bool {
        self.threshold.is_none_or(|threshold| semantic >= threshold)
    }

    /// Drop items whose semantic similarity is below the threshold.
    #[must_use]
    pub fn apply_threshold<T>(&self, items: Vec<T>, semantic: impl Fn(&T) -> f32) -> Vec<T> {
        if self.threshold.is_none() {
            return items;
        }
        items
            .into_iter()
            .filter(|item| self.passes(semantic(item)))
            .collect()
    }

    /// Weighted sum for every input that passes the threshold.
    ///
    /// Output is ordered by combined score descending, ties by id. Each result
    /// carries a debug trace with the applied weights and the same signals
    /// scored under the standard and enhanced profiles.
    #[must_use]
    pub fn combine(&self, inputs: Vec<SignalInput>) -> Vec<RankedResult> {
        let mut results: Vec<RankedResult> = inputs
            .into_iter()
            .filter(|input| self.passes(input.scores.semantic))
            .map(|input| self.combine_one(input))
            .collect();
        sort_by_final(&mut results);
        results
    }

    fn combine_one(&self, input: SignalInput) -> RankedResult {
        let mut scores = input.scores;
        let raw = self.profile.score(&scores);
        scores.final_score = raw;

        RankedResult {
            candidate: input.candidate,
            scores,
            matched_terms: Vec::new(),
            debug: Some(DebugTrace {
                profile: self.profile.name.clone(),
                weights_used: self.profile.weights,
                raw_score: raw,
                original_score: self.standard.score(&scores),
                enhanced_score: self.enhanced.score(&scores),
                fallbacks: input.fallbacks,
            }),
        }
    }
}

/// Sort by `final` descending, breaking exact ties by ascending id.
pub fn sort_by_final(results: &mut [RankedResult]) {
    results.sort_by(|left, right| {
        right
            .scores
            .final_score
            .total_cmp(&left.scores.final_score)
            .then_with(|| left.candidate.id.cmp(&right.candidate.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(id: &str, lexical: f32, semantic: f32) -> SignalInput {
        SignalInput::new(
            Candidate::new(id, "title", "abstract"),
            ScoreVector::default()
                .with(Signal::Lexical, lexical)
                .with(Signal::Semantic, semantic)
                .with(Signal::HistoricalFeedback, 0.5),
        )
    }

    #[test]
    fn threshold_is_a_hard_filter() {
        let combiner = WeightCombiner::new(WeightProfile::standard(), Some(0.5));
        let results = combiner.combine(vec![input("1", 1.0, 0.49), input("2", 0.0, 0.5)]);
        let ids: Vec<_> = results.iter().map(RankedResult::id).collect();
        assert_eq!(ids, ["2"]);
    }

    #[test]
    fn debug_carries_both_reference_profiles() {
        let combiner = WeightCombiner::new(WeightProfile::enhanced(), None);
        let results = combiner.combine(vec![input("1", 1.0, 0.8)]);
        let debug = results[0].debug.as_ref().expect("debug trace");

        let standard = 0.15 * 1.0 + 0.25 * 0.8 + 0.10 * 0.5;
        let enhanced = 0.25 * 1.0 + 0.35 * 0.8 + 0.05 * 0.5;
        assert!((debug.original_score - standard).abs() < 1e-6);
        assert!((debug.enhanced_score - enhanced).abs() < 1e-6);
        assert!((results[0].final_score() - enhanced).abs() < 1e-6);
        assert_eq!(debug.profile, "enhanced");
    }

    #[test]
    fn equal_scores_order_by_id() {
        let combiner = WeightCombiner::new(WeightProfile::standard(), None);
        let results = combiner.combine(vec![input("b", 1.0, 1.0), input("a", 1.0, 1.0)]);
        let ids: Vec<_> = results.iter().map(RankedResult::id).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn degraded_outcome_records_fallback() {
        let mut input = input("1", 1.0, 1.0);
        input.resolve(Signal::Coherence, &SignalOutcome::TimedOut, 0.5);
        input.resolve(Signal::Graph, &SignalOutcome::Success(0.3), 0.0);

        assert!((input.scores.coherence - 0.5).abs() < f32::EPSILON);
        assert!((input.scores.graph - 0.3).abs() < f32::EPSILON);
        assert_eq!(input.fallbacks.len(), 1);
        assert_eq!(input.fallbacks[0].signal, Signal::Coherence);
        assert_eq!(input.fallbacks[0].reason, "timed out");
    }
}
