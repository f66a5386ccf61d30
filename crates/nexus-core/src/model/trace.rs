//! Per-stage timing and status for one pipeline run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// A named pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    QueryExpansion,
    LexicalFilter,
    VectorSearch,
    CandidateMerge,
    CoherenceScoring,
    GraphSimilarity,
    PrfExpansion,
    Weighting,
    MmrDiversity,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QueryExpansion => "query_expansion",
            Self::LexicalFilter => "lexical_filter",
            Self::VectorSearch => "vector_search",
            Self::CandidateMerge => "candidate_merge",
            Self::CoherenceScoring => "coherence_scoring",
            Self::GraphSimilarity => "graph_similarity",
            Self::PrfExpansion => "prf_expansion",
            Self::Weighting => "weighting",
            Self::MmrDiversity => "mmr_diversity",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Ok,
    /// Completed, but some calls fell back to neutral values.
    Degraded,
    /// The stage's backend failed; its contribution is empty.
    Failed,
    /// Not run for this request.
    Skipped,
}

impl StageStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    #[serde(rename = "timing_ms", with = "duration_ms")]
    pub elapsed: Duration,
    pub results: usize,
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Ordered stage timings plus total wall time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineTrace {
    pub stages: Vec<StageTiming>,
    #[serde(rename = "total_ms", with = "duration_ms")]
    pub total: Duration,
}

impl PipelineTrace {
    /// First entry recorded for `stage`.
    #[must_use]
    pub fn stage(&self, stage: Stage) -> Option<&StageTiming> {
        self.stages.iter().find(|timing| timing.stage == stage)
    }

    #[must_use]
    pub fn degraded(&self) -> bool {
        self.stages
            .iter()
            .any(|timing| matches!(timing.status, StageStatus::Degraded | StageStatus::Failed))
    }
}

/// Collects stage timings while a request runs.
#[derive(Debug)]
pub struct TraceRecorder {
    started: Instant,
    stages: Vec<StageTiming>,
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::start()
    }
}

impl TraceRecorder {
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            stages: Vec::new(),
        }
    }

    pub fn record(&mut self, stage: Stage, elapsed: Duration, results: usize, status: StageStatus) {
        self.stages.push(StageTiming {
            stage,
            elapsed,
            results,
            status,
            note: None,
        });
    }

    pub fn record_with_note(
        &mut self,
        stage: Stage,
        elapsed: Duration,
        results: usize,
        status: StageStatus,
        note: impl Into<String>,
    ) {
        self.stages.push(StageTiming {
            stage,
            elapsed,
            results,
            status,
            note: Some(note.into()),
        });
    }

    pub fn skip(&mut self, stage: Stage) {
        self.record(stage, Duration::ZERO, 0, StageStatus::Skipped);
    }

    #[must_use]
    pub fn finish(self) -> PipelineTrace {
        PipelineTrace {
            stages: self.stages,
            total: self.started.elapsed(),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = f64::deserialize(deserializer)?;
        if !millis.is_finite() || millis < 0.0 {
            return Ok(Duration::ZERO);
        }
        Ok(Duration::from_secs_f64(millis / 1000.0))
    }
}
