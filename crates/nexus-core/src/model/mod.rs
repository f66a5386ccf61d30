//! Request, candidate, score, and trace types shared across the pipeline.

pub mod candidate;
pub mod context;
pub mod profile;
pub mod query;
pub mod result;
pub mod score;
pub mod trace;

pub use candidate::Candidate;
pub use context::QueryContext;
pub use profile::{
    ADAPTIVE_PROFILE, ENHANCED_PROFILE, ProfileRegistry, STANDARD_PROFILE, SignalWeights,
    WeightProfile,
};
pub use query::{ProfileSelector, Query, QueryOptions, SearchRequest};
pub use result::{DebugTrace, RankedResult, SearchResponse, SignalFallback};
pub use score::{ScoreVector, Signal, SignalOutcome};
pub use trace::{PipelineTrace, Stage, StageStatus, StageTiming, TraceRecorder};
