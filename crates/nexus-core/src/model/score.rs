use serde::{Deserialize, Serialize};
use std::fmt;

/// One relevance signal contributing to the combined score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Lexical,
    Semantic,
    Coherence,
    Graph,
    Feedback,
    HistoricalFeedback,
}

impl Signal {
    pub const ALL: [Self; 6] = [
        Self::Lexical,
        Self::Semantic,
        Self::Coherence,
        Self::Graph,
        Self::Feedback,
        Self::HistoricalFeedback,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Semantic => "semantic",
            Self::Coherence => "coherence",
            Self::Graph => "graph",
            Self::Feedback => "feedback",
            Self::HistoricalFeedback => "historical_feedback",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-candidate signal values.
///
/// Every signal is kept in `[0, 1]`; [`ScoreVector::set`] clamps and maps
/// non-finite input to 0. `final_score` is the combined relevance and may dip
/// below zero while diversity penalties are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreVector {
    pub lexical: f32,
    pub semantic: f32,
    pub coherence: f32,
    pub graph: f32,
    pub feedback: f32,
    pub historical_feedback: f32,
    pub diversity_penalty: f32,
    #[serde(rename = "final")]
    pub final_score: f32,
}

impl ScoreVector {
    #[must_use]
    pub const fn get(&self, signal: Signal) -> f32 {
        match signal {
            Signal::Lexical => self.lexical,
            Signal::Semantic => self.semantic,
            Signal::Coherence => self.coherence,
            Signal::Graph => self.graph,
            Signal::Feedback => self.feedback,
            Signal::HistoricalFeedback => self.historical_feedback,
        }
    }

    pub fn set(&mut self, signal: Signal, value: f32) {
        let value = normalize_unit(value);
        match signal {
            Signal::Lexical => self.lexical = value,
            Signal::Semantic => self.semantic = value,
            Signal::Coherence => self.coherence = value,
            Signal::Graph => self.graph = value,
            Signal::Feedback => self.feedback = value,
            Signal::HistoricalFeedback => self.historical_feedback = value,
        }
    }

    /// Builder-style [`ScoreVector::set`].
    #[must_use]
    pub fn with(mut self, signal: Signal, value: f32) -> Self {
        self.set(signal, value);
        self
    }
}

/// Result of one independently fallible signal call.
///
/// Resolved to a number only at the combiner boundary, so a slow or failing
/// call degrades a single value instead of the request. Raw call payloads
/// (`T` other than `f32`) are mapped to scores with [`SignalOutcome::map`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SignalOutcome<T = f32> {
    Success(T),
    TimedOut,
    Failed(String),
}

impl<T> SignalOutcome<T> {
    /// Transform the success payload, keeping timeouts and failures.
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SignalOutcome<U> {
        match self {
            Self::Success(value) => SignalOutcome::Success(f(value)),
            Self::TimedOut => SignalOutcome::TimedOut,
            Self::Failed(reason) => SignalOutcome::Failed(reason),
        }
    }

    #[must_use]
    pub const fn success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }
}

impl SignalOutcome {
    /// Numeric value for this outcome, or `fallback` when degraded.
    ///
    /// A successful but non-finite value also falls back.
    #[must_use]
    pub fn resolve(&self, fallback: f32) -> f32 {
        match self {
            Self::Success(value) if value.is_finite() => value.clamp(0.0, 1.0),
            _ => fallback,
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Success(value) if value.is_finite())
    }

    /// Human-readable reason for a degraded outcome.
    #[must_use]
    pub fn degradation_reason(&self) -> Option<String> {
        match self {
            Self::Success(value) if value.is_finite() => None,
            Self::Success(_) => Some("non-finite value".to_string()),
            Self::TimedOut => Some("timed out".to_string()),
            Self::Failed(reason) => Some(reason.clone()),
        }
    }
}

fn normalize_unit(value: f32) -> f32 {
    if !value.is_finite() {
        return 0.0;
    }

    value.clamp(0.0, 1.0)
}
