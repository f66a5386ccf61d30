//! Thompson-sampling weight adaptation.
//!
//! Each query context keeps one `Beta(α, β)` posterior per signal weight,
//! starting from the uniform prior `Beta(1, 1)`. An accepted result credits the
//! signal(s) that contributed most to its score; a rejected one debits them.
//!
//! To serve a profile, every posterior is sampled once and the draw scales the
//! base profile's weight for that signal by `2 × sample`. With the uniform
//! prior the expected multiplier is 1, so an untrained context behaves like
//! the base profile on average. The scaled weights are rescaled to keep the
//! base profile's total.

use crate::log::{append_feedback_event, load_feedback_events};
use crate::outcome::{FeedbackEvent, Outcome, OutcomeAction};
use crate::store::ProfileStore;
use anyhow::{Context, Result};
use nexus_core::model::{ADAPTIVE_PROFILE, QueryContext, SignalWeights, WeightProfile};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PRIOR_ALPHA: f64 = 1.0;
const PRIOR_BETA: f64 = 1.0;
const CONTRIBUTION_TOLERANCE: f64 = 1e-9;
const STATE_FILE: &str = "adaptive_state.json";

/// Posterior distribution for a single weight parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WeightPosterior {
    pub alpha_param: f64,
    pub beta_param: f64,
}

impl Default for WeightPosterior {
    fn default() -> Self {
        Self {
            alpha_param: PRIOR_ALPHA,
            beta_param: PRIOR_BETA,
        }
    }
}

impl WeightPosterior {
    fn record_success(&mut self) {
        self.alpha_param = sanitize_shape(self.alpha_param, PRIOR_ALPHA) + 1.0;
        self.beta_param = sanitize_shape(self.beta_param, PRIOR_BETA);
    }

    fn record_failure(&mut self) {
        self.alpha_param = sanitize_shape(self.alpha_param, PRIOR_ALPHA);
        self.beta_param = sanitize_shape(self.beta_param, PRIOR_BETA) + 1.0;
    }

    fn sample(&self, rng: &mut impl Rng) -> f64 {
        let alpha = sanitize_shape(self.alpha_param, PRIOR_ALPHA);
        let beta = sanitize_shape(self.beta_param, PRIOR_BETA);

        Beta::new(alpha, beta)
            .map(|distribution| distribution.sample(rng))
            .unwrap_or(0.5)
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        let alpha = sanitize_shape(self.alpha_param, PRIOR_ALPHA);
        let beta = sanitize_shape(self.beta_param, PRIOR_BETA);
        alpha / (alpha + beta)
    }
}

/// Learned posteriors for one query context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextPosteriors {
    pub context: String,
    pub posteriors: SignalWeights<WeightPosterior>,
    #[serde(default)]
    pub outcomes: u64,
}

impl ContextPosteriors {
    #[must_use]
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            posteriors: SignalWeights::from_fn(|_| WeightPosterior::default()),
            outcomes: 0,
        }
    }
}

/// Accept/reject counts for one candidate across all contexts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateHistory {
    pub accepted: u64,
    pub rejected: u64,
}

impl CandidateHistory {
    /// Posterior mean acceptance under a uniform prior.
    #[must_use]
    pub fn acceptance(&self) -> f32 {
        let accepted = self.accepted as f64;
        let rejected = self.rejected as f64;
        #[allow(clippy::cast_possible_truncation)]
        let mean = ((accepted + PRIOR_ALPHA) / (accepted + rejected + PRIOR_ALPHA + PRIOR_BETA))
            as f32;
        mean
    }

    fn record(&mut self, action: OutcomeAction) {
        match action {
            OutcomeAction::Accepted => self.accepted += 1,
            OutcomeAction::Rejected => self.rejected += 1,
        }
    }
}

/// Everything the adaptive store has learned.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LearnedState {
    #[serde(default)]
    pub contexts: BTreeMap<String, ContextPosteriors>,
    #[serde(default)]
    pub candidates: BTreeMap<String, CandidateHistory>,
    /// Number of feedback log events folded into this state.
    #[serde(default)]
    pub events: u64,
}

impl LearnedState {
    fn apply(&mut self, context_key: &str, outcome: &Outcome) {
        let entry = self
            .contexts
            .entry(context_key.to_string())
            .or_insert_with(|| ContextPosteriors::new(context_key));
        update_from_outcome(&mut entry.posteriors, outcome);
        entry.outcomes += 1;

        self.candidates
            .entry(outcome.candidate_id.clone())
            .or_default()
            .record(outcome.action);
        self.events += 1;
    }
}

/// Update posteriors from one outcome.
///
/// The update targets the signal(s) with the highest contribution to the
/// reported result. When nothing contributed, every posterior is updated.
pub fn update_from_outcome(posteriors: &mut SignalWeights<WeightPosterior>, outcome: &Outcome) {
    let contributions = outcome.contributions();
    let max_contribution = contributions
        .iter()
        .map(|(_, value)| f64::from(value))
        .filter(|value| value.is_finite())
        .map(f64::abs)
        .fold(0.0_f64, f64::max);

    let update_all = max_contribution <= CONTRIBUTION_TOLERANCE;

    for (signal, contribution) in contributions.iter() {
        let contribution = f64::from(contribution);
        let relevant = update_all
            || (contribution.is_finite()
                && (contribution.abs() - max_contribution).abs() <= CONTRIBUTION_TOLERANCE);
        if !relevant {
            continue;
        }

        let posterior = posteriors.get_mut(signal);
        match outcome.action {
            OutcomeAction::Accepted => posterior.record_success(),
            OutcomeAction::Rejected => posterior.record_failure(),
        }
    }
}

/// Draw one sample from every posterior.
#[must_use]
pub fn sample_multipliers(
    posteriors: &SignalWeights<WeightPosterior>,
    rng: &mut impl Rng,
) -> SignalWeights<f64> {
    SignalWeights::from_fn(|signal| sanitize_sample(posteriors.get(signal).sample(&mut *rng)))
}

/// Adaptive [`ProfileStore`] backed by per-context Beta posteriors.
///
/// Optionally persisted to a directory holding `feedback.jsonl` and
/// `adaptive_state.json`. Recording is serialized through `persist` so the
/// log order, the in-memory state and the state file always agree; readers
/// only wait on the in-memory update.
#[derive(Debug)]
pub struct ThompsonProfileStore {
    base: WeightProfile,
    state: RwLock<LearnedState>,
    rng: Mutex<StdRng>,
    persist: Mutex<()>,
    dir: Option<PathBuf>,
}

impl ThompsonProfileStore {
    /// In-memory store. A seed makes sampling reproducible.
    #[must_use]
    pub fn new(base: WeightProfile, seed: Option<u64>) -> Self {
        Self {
            base,
            state: RwLock::new(LearnedState::default()),
            rng: Mutex::new(seeded_rng(seed)),
            persist: Mutex::new(()),
            dir: None,
        }
    }

    /// Store persisted under `dir`.
    ///
    /// Loads `adaptive_state.json` when present, then replays every
    /// `feedback.jsonl` event the saved state has not absorbed yet. Without a
    /// state file the whole log is replayed.
    ///
    /// # Errors
    ///
    /// Returns an error if existing state or log files cannot be read.
    pub fn open(dir: &Path, base: WeightProfile, seed: Option<u64>) -> Result<Self> {
        let state_path = dir.join(STATE_FILE);
        let mut state: LearnedState = if state_path.exists() {
            let bytes = fs::read(&state_path)
                .with_context(|| format!("failed to read {}", state_path.display()))?;
            serde_json::from_slice(&bytes)
                .with_context(|| format!("failed to parse {}", state_path.display()))?
        } else {
            LearnedState::default()
        };

        let events = load_feedback_events(dir)?;
        let absorbed = usize::try_from(state.events).unwrap_or(usize::MAX);
        let pending = events.get(absorbed..).unwrap_or_default();
        for event in pending {
            state.apply(&event.context, &event.outcome);
        }
        if !pending.is_empty() {
            info!(
                events = pending.len(),
                total = events.len(),
                "replayed feedback log into adaptive state"
            );
        }

        Ok(Self {
            base,
            state: RwLock::new(state),
            rng: Mutex::new(seeded_rng(seed)),
            persist: Mutex::new(()),
            dir: Some(dir.to_path_buf()),
        })
    }

    #[must_use]
    pub const fn base(&self) -> &WeightProfile {
        &self.base
    }

    /// Copy of the learned state.
    #[must_use]
    pub fn snapshot(&self) -> LearnedState {
        self.state.read().clone()
    }

    fn save_state(dir: &Path, body: &[u8]) -> Result<()> {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(STATE_FILE);
        let tmp_path = path.with_extension(format!("json.{}.tmp", std::process::id()));

        fs::write(&tmp_path, body)
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path).with_context(|| {
            format!(
                "failed to atomically move {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;
        Ok(())
    }

    /// Log, apply and save one outcome. Callers hold `persist`.
    fn record_serialized(&self, context: &QueryContext, outcome: &Outcome) -> Result<()> {
        let key = context.key();
        let event = FeedbackEvent::now(key.clone(), outcome.clone());
        if let Some(dir) = &self.dir {
            append_feedback_event(dir, &event)?;
        }

        let body = {
            let mut state = self.state.write();
            state.apply(&key, outcome);
            match &self.dir {
                Some(_) => Some(
                    serde_json::to_vec_pretty(&*state).context("failed to serialize adaptive state")?,
                ),
                None => None,
            }
        };

        if let (Some(dir), Some(body)) = (&self.dir, body) {
            Self::save_state(dir, &body)?;
        }

        debug!(
            context = %key,
            candidate = %outcome.candidate_id,
            action = ?outcome.action,
            "recorded outcome"
        );
        Ok(())
    }
}

impl ProfileStore for ThompsonProfileStore {
    fn profile_for(&self, context: &QueryContext) -> WeightProfile {
        let key = context.key();
        let posteriors = self.state.read().contexts.get(&key).map_or_else(
            || ContextPosteriors::new(key.as_str()).posteriors,
            |learned| learned.posteriors,
        );
        let multipliers = {
            let mut rng = self.rng.lock();
            sample_multipliers(&posteriors, &mut *rng)
        };

        let base = &self.base.weights;
        #[allow(clippy::cast_possible_truncation)]
        let scaled = SignalWeights::from_fn(|signal| {
            (f64::from(base.get(signal)) * 2.0 * multipliers.get(signal)) as f32
        });

        let base_total = base.total();
        let scaled_total = scaled.total();
        let weights = if scaled_total > f32::EPSILON {
            scaled.map(|weight| weight / scaled_total * base_total)
        } else {
            *base
        };

        debug!(context = %key, ?weights, "sampled adaptive weights");
        WeightProfile::new(ADAPTIVE_PROFILE, weights)
    }

    fn record(&self, context: &QueryContext, outcome: &Outcome) -> Result<()> {
        let persist = self.persist.lock();
        let result = self.record_serialized(context, outcome);
        drop(persist);
        result
    }

    fn historical_score(&self, candidate_id: &str) -> Option<f32> {
        self.state
            .read()
            .candidates
            .get(candidate_id)
            .map(CandidateHistory::acceptance)
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}

fn sanitize_shape(value: f64, default: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        default
    }
}

fn sanitize_sample(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::model::{ScoreVector, Signal};

    fn accepted(weights: SignalWeights) -> Outcome {
        Outcome::new("2", OutcomeAction::Accepted, weights)
    }

    #[test]
    fn accepted_outcome_credits_top_contributor() {
        let mut posteriors = ContextPosteriors::new("general").posteriors;
        // coherence carries the largest weight in the standard profile
        update_from_outcome(&mut posteriors, &accepted(SignalWeights::default()));

        assert_eq!(posteriors.coherence.alpha_param, 2.0);
        assert_eq!(posteriors.coherence.beta_param, 1.0);
        assert_eq!(posteriors.lexical.alpha_param, 1.0);
        assert_eq!(posteriors.semantic.alpha_param, 1.0);
    }

    #[test]
    fn rejected_outcome_debits_ties_using_signal_values() {
        let mut posteriors = ContextPosteriors::new("general").posteriors;
        let weights = SignalWeights::from_fn(|_| 0.5_f32);
        let signals = ScoreVector::default()
            .with(Signal::Lexical, 0.8)
            .with(Signal::Graph, 0.8)
            .with(Signal::Semantic, 0.1);
        let outcome = Outcome::new("4", OutcomeAction::Rejected, weights).with_signals(signals);

        update_from_outcome(&mut posteriors, &outcome);

        assert_eq!(posteriors.lexical.beta_param, 2.0);
        assert_eq!(posteriors.graph.beta_param, 2.0);
        assert_eq!(posteriors.semantic.beta_param, 1.0);
        assert_eq!(posteriors.coherence.beta_param, 1.0);
    }

    #[test]
    fn zero_contribution_updates_everything() {
        let mut posteriors = ContextPosteriors::new("general").posteriors;
        let outcome = accepted(SignalWeights::from_fn(|_| 0.0_f32));
        update_from_outcome(&mut posteriors, &outcome);
        assert!(posteriors.iter().all(|(_, p)| p.alpha_param == 2.0));
    }

    #[test]
    fn adaptive_profile_preserves_base_total() {
        let store = ThompsonProfileStore::new(WeightProfile::standard(), Some(7));
        let profile = store.profile_for(&QueryContext::for_domain("Privacy"));

        assert_eq!(profile.name, ADAPTIVE_PROFILE);
        assert!((profile.weights.total() - 1.0).abs() < 1e-5);
        assert!(profile.weights.validate().is_ok());
    }

    #[test]
    fn seeded_stores_sample_identically() {
        let context = QueryContext::for_domain("Cryptography");
        let left = ThompsonProfileStore::new(WeightProfile::enhanced(), Some(42));
        let right = ThompsonProfileStore::new(WeightProfile::enhanced(), Some(42));
        assert_eq!(left.profile_for(&context), right.profile_for(&context));
    }

    #[test]
    fn repeated_acceptance_shifts_weight_toward_credited_signal() {
        let store = ThompsonProfileStore::new(WeightProfile::standard(), Some(3));
        let context = QueryContext::for_domain("Cryptography");
        for _ in 0..200 {
            store
                .record(&context, &accepted(SignalWeights::default()))
                .expect("record");
        }
        for _ in 0..200 {
            let outcome = Outcome::new("9", OutcomeAction::Rejected, SignalWeights::default())
                .with_signals(ScoreVector::default().with(Signal::Semantic, 1.0));
            store.record(&context, &outcome).expect("record");
        }

        let trials = 50;
        let mut coherence = 0.0;
        let mut semantic = 0.0;
        for _ in 0..trials {
            let profile = store.profile_for(&context);
            coherence += profile.weights.coherence;
            semantic += profile.weights.semantic;
        }
        assert!(coherence / trials as f32 > 0.30);
        assert!(semantic / (trials as f32) < 0.25);
    }

    #[test]
    fn historical_score_tracks_candidate_outcomes() {
        let store = ThompsonProfileStore::new(WeightProfile::standard(), Some(1));
        let context = QueryContext::default();
        assert!(store.historical_score("2").is_none());

        store
            .record(&context, &accepted(SignalWeights::default()))
            .expect("record");
        store
            .record(&context, &accepted(SignalWeights::default()))
            .expect("record");
        // Beta(1 + 2, 1 + 0) mean
        let score = store.historical_score("2").expect("seen");
        assert!((score - 0.75).abs() < 1e-6);
    }

    #[test]
    fn persisted_store_reloads_state_and_replays_log() {
        let temp = tempfile::tempdir().expect("temp dir");
        let context = QueryContext::for_domain("Blockchain");
        {
            let store = ThompsonProfileStore::open(temp.path(), WeightProfile::standard(), None)
                .expect("open");
            store
                .record(&context, &accepted(SignalWeights::default()))
                .expect("record");
        }

        let reopened = ThompsonProfileStore::open(temp.path(), WeightProfile::standard(), None)
            .expect("reopen");
        let state = reopened.snapshot();
        assert_eq!(state.contexts["blockchain"].outcomes, 1);
        assert_eq!(state.candidates["2"].accepted, 1);

        fs::remove_file(temp.path().join(STATE_FILE)).expect("remove state");
        let replayed = ThompsonProfileStore::open(temp.path(), WeightProfile::standard(), None)
            .expect("replay");
        assert_eq!(replayed.snapshot(), state);
    }
}
