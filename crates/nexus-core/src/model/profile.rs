//! Weight profiles for combining signals.
//!
//! A profile is a named [`SignalWeights`] set. The combined relevance is the
//! plain weighted sum
//!
//! `final = w_lex*L + w_sem*S + w_coh*C + w_graph*G + w_fb*F + w_hist*H`
//!
//! Weights conventionally sum to 1, but nothing here assumes it: the sum is
//! never renormalized behind the caller's back.

use crate::error::PipelineError;
use crate::model::score::{ScoreVector, Signal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const STANDARD_PROFILE: &str = "standard";
pub const ENHANCED_PROFILE: &str = "enhanced";
/// Reserved selector for weights produced by the adaptive policy.
pub const ADAPTIVE_PROFILE: &str = "adaptive";

/// One value per signal.
///
/// Used with `f32` for combination weights and with other payloads (for
/// example learned posteriors) wherever a per-signal table is needed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalWeights<T = f32> {
    pub lexical: T,
    pub semantic: T,
    pub coherence: T,
    pub graph: T,
    pub feedback: T,
    pub historical_feedback: T,
}

impl Default for SignalWeights<f32> {
    fn default() -> Self {
        Self {
            lexical: 0.15,
            semantic: 0.25,
            coherence: 0.30,
            graph: 0.10,
            feedback: 0.10,
            historical_feedback: 0.10,
        }
    }
}

impl<T: Copy> SignalWeights<T> {
    pub fn from_fn(mut f: impl FnMut(Signal) -> T) -> Self {
        Self {
            lexical: f(Signal::Lexical),
            semantic: f(Signal::Semantic),
            coherence: f(Signal::Coherence),
            graph: f(Signal::Graph),
            feedback: f(Signal::Feedback),
            historical_feedback: f(Signal::HistoricalFeedback),
        }
    }

    #[must_use]
    pub fn get(&self, signal: Signal) -> T {
        match signal {
            Signal::Lexical => self.lexical,
            Signal::Semantic => self.semantic,
            Signal::Coherence => self.coherence,
            Signal::Graph => self.graph,
            Signal::Feedback => self.feedback,
            Signal::HistoricalFeedback => self.historical_feedback,
        }
    }

    pub fn get_mut(&mut self, signal: Signal) -> &mut T {
        match signal {
            Signal::Lexical => &mut self.lexical,
            Signal::Semantic => &mut self.semantic,
            Signal::Coherence => &mut self.coherence,
            Signal::Graph => &mut self.graph,
            Signal::Feedback => &mut self.feedback,
            Signal::HistoricalFeedback => &mut self.historical_feedback,
        }
    }

    pub fn map<U: Copy>(&self, mut f: impl FnMut(T) -> U) -> SignalWeights<U> {
        SignalWeights::from_fn(|signal| f(self.get(signal)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Signal, T)> + '_ {
        Signal::ALL.into_iter().map(|signal| (signal, self.get(signal)))
    }
}

impl SignalWeights<f32> {
    /// Weighted sum `Σ weight × signal` over the six relevance signals.
    #[must_use]
    pub fn weighted_sum(&self, scores: &ScoreVector) -> f32 {
        (self.lexical * scores.lexical)
            + (self.semantic * scores.semantic)
            + (self.coherence * scores.coherence)
            + (self.graph * scores.graph)
            + (self.feedback * scores.feedback)
            + (self.historical_feedback * scores.historical_feedback)
    }

    #[must_use]
    pub fn total(&self) -> f32 {
        self.iter().map(|(_, weight)| weight).sum()
    }

    /// Scale weights to sum to 1. All-zero weights are returned unchanged.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let total = self.total();
        if !total.is_finite() || total <= f32::EPSILON {
            return *self;
        }
        self.map(|weight| weight / total)
    }

    /// Reject non-finite or negative weights.
    pub fn validate(&self) -> Result<(), String> {
        for (signal, weight) in self.iter() {
            if !weight.is_finite() {
                return Err(format!("weight for {signal} is not finite"));
            }
            if weight < 0.0 {
                return Err(format!("weight for {signal} is negative ({weight})"));
            }
        }
        Ok(())
    }
}

/// A named weight mapping, selected per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightProfile {
    pub name: String,
    pub weights: SignalWeights,
}

impl WeightProfile {
    pub fn new(name: impl Into<String>, weights: SignalWeights) -> Self {
        Self {
            name: name.into(),
            weights,
        }
    }

    /// Baseline weights.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(STANDARD_PROFILE, SignalWeights::default())
    }

    /// Weights that lean on retrieval signals over the coherence judgment.
    #[must_use]
    pub fn enhanced() -> Self {
        Self::new(
            ENHANCED_PROFILE,
            SignalWeights {
                lexical: 0.25,
                semantic: 0.35,
                coherence: 0.20,
                graph: 0.05,
                feedback: 0.10,
                historical_feedback: 0.05,
            },
        )
    }

    #[must_use]
    pub fn score(&self, scores: &ScoreVector) -> f32 {
        self.weights.weighted_sum(scores)
    }
}

/// Registry of named profiles available to requests.
///
/// Always contains `standard` and `enhanced`; extra profiles come from
/// configuration. The adaptive selector is not a registry entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, WeightProfile>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        for profile in [WeightProfile::standard(), WeightProfile::enhanced()] {
            profiles.insert(profile.name.clone(), profile);
        }
        Self { profiles }
    }
}

impl ProfileRegistry {
    /// Register or replace a profile.
    ///
    /// # Errors
    ///
    /// Rejects the reserved `adaptive` name, empty names, and invalid weights.
    pub fn insert(&mut self, profile: WeightProfile) -> Result<(), PipelineError> {
        let name = profile.name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case(ADAPTIVE_PROFILE) {
            return Err(PipelineError::InvalidProfile {
                name: profile.name.clone(),
                reason: "name is empty or reserved".to_string(),
            });
        }
        profile
            .weights
            .validate()
            .map_err(|reason| PipelineError::InvalidProfile {
                name: profile.name.clone(),
                reason,
            })?;

        self.profiles.insert(name.to_string(), profile);
        Ok(())
    }

    /// Look up a profile by exact name.
    ///
    /// # Errors
    ///
    /// Unknown names are a fatal request error; nothing is substituted.
    pub fn get(&self, name: &str) -> Result<&WeightProfile, PipelineError> {
        self.profiles
            .get(name)
            .ok_or_else(|| PipelineError::UnknownProfile(name.to_string()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeightProfile> {
        self.profiles.values()
    }
}
