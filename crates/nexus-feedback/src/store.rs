use crate::outcome::Outcome;
use anyhow::Result;
use nexus_core::model::{QueryContext, WeightProfile};

/// `historicalFeedback` for a candidate nobody has reported on yet.
pub const NEUTRAL_HISTORY: f32 = 0.5;

/// Source of weight profiles and outcome statistics.
///
/// Read during a run, written only once the run has finished and an outcome
/// is reported. Implementations must tolerate concurrent readers.
pub trait ProfileStore: Send + Sync {
    /// Weights to apply for a query in `context`.
    fn profile_for(&self, context: &QueryContext) -> WeightProfile;

    /// Learn from the outcome of a completed run.
    ///
    /// # Errors
    ///
    /// Returns an error if the outcome cannot be persisted.
    fn record(&self, context: &QueryContext, outcome: &Outcome) -> Result<()>;

    /// Historical acceptance for a candidate in `[0, 1]`, if anything is known.
    fn historical_score(&self, _candidate_id: &str) -> Option<f32> {
        None
    }
}

/// Always answers with the same profile and learns nothing.
#[derive(Debug, Clone)]
pub struct StaticProfileStore {
    profile: WeightProfile,
}

impl StaticProfileStore {
    #[must_use]
    pub const fn new(profile: WeightProfile) -> Self {
        Self { profile }
    }
}

impl Default for StaticProfileStore {
    fn default() -> Self {
        Self::new(WeightProfile::standard())
    }
}

impl ProfileStore for StaticProfileStore {
    fn profile_for(&self, _context: &QueryContext) -> WeightProfile {
        self.profile.clone()
    }

    fn record(&self, context: &QueryContext, outcome: &Outcome) -> Result<()> {
        tracing::debug!(
            context = %context.key(),
            candidate = %outcome.candidate_id,
            "static profile store ignores outcome"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::OutcomeAction;
    use nexus_core::model::SignalWeights;

    #[test]
    fn static_store_is_constant() {
        let store = StaticProfileStore::new(WeightProfile::enhanced());
        let context = QueryContext::for_domain("Cryptography");
        assert_eq!(store.profile_for(&context), WeightProfile::enhanced());

        store
            .record(
                &context,
                &Outcome::new("2", OutcomeAction::Accepted, SignalWeights::default()),
            )
            .expect("record");
        assert_eq!(store.profile_for(&context), WeightProfile::enhanced());
        assert!(store.historical_score("2").is_none());
    }
}
