use crate::model::candidate::Candidate;
use crate::model::context::QueryContext;
use crate::model::profile::SignalWeights;
use crate::model::score::{ScoreVector, Signal};
use crate::model::trace::PipelineTrace;
use serde::{Deserialize, Serialize};

/// A signal that fell back to its neutral value for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalFallback {
    pub signal: Signal,
    pub reason: String,
    pub value: f32,
}

/// Explanation of how a candidate's combined score came about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugTrace {
    pub profile: String,
    pub weights_used: SignalWeights,
    /// Combined relevance before any diversity penalty.
    pub raw_score: f32,
    /// The same signals under the standard profile, for comparison.
    pub original_score: f32,
    /// The same signals under the enhanced profile.
    pub enhanced_score: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<SignalFallback>,
}

/// One entry in a ranked response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub candidate: Candidate,
    pub scores: ScoreVector,
    /// Query terms found in the title or abstract.
    #[serde(default)]
    pub matched_terms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugTrace>,
}

impl RankedResult {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.candidate.id
    }

    #[must_use]
    pub const fn final_score(&self) -> f32 {
        self.scores.final_score
    }
}

/// Ranked results plus the trace of how they were produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_query: Option<String>,
    pub profile: String,
    pub context: QueryContext,
    pub results: Vec<RankedResult>,
    pub trace: PipelineTrace,
}

impl SearchResponse {
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.results.iter().map(RankedResult::id).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
