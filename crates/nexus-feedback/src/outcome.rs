use chrono::{DateTime, Utc};
use nexus_core::model::{ScoreVector, Signal, SignalWeights};
use serde::{Deserialize, Serialize};

/// What the user did with a ranked result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeAction {
    Accepted,
    Rejected,
}

/// Outcome reported for one result of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub candidate_id: String,
    pub action: OutcomeAction,
    /// Weights applied when the result was ranked.
    pub weights_used: SignalWeights,
    /// Combined score the result was shown with.
    #[serde(default)]
    pub score: f32,
    /// Signal values of the result, when the caller still has them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signals: Option<ScoreVector>,
}

impl Outcome {
    pub fn new(
        candidate_id: impl Into<String>,
        action: OutcomeAction,
        weights_used: SignalWeights,
    ) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            action,
            weights_used,
            score: 0.0,
            signals: None,
        }
    }

    #[must_use]
    pub const fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    #[must_use]
    pub const fn with_signals(mut self, signals: ScoreVector) -> Self {
        self.signals = Some(signals);
        self
    }

    /// Per-signal contribution to the shown score.
    ///
    /// Without signal values the weights themselves stand in.
    #[must_use]
    pub fn contributions(&self) -> SignalWeights {
        SignalWeights::from_fn(|signal: Signal| {
            let weight = self.weights_used.get(signal);
            self.signals
                .as_ref()
                .map_or(weight, |scores| weight * scores.get(signal))
        })
    }
}

/// One line of the feedback log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    /// Context key the outcome is credited to.
    pub context: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl FeedbackEvent {
    pub fn now(context: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            timestamp: Utc::now(),
            context: context.into(),
            outcome,
        }
    }
}
