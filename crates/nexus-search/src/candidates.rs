//! Candidate generation: concurrent lexical and vector retrieval, merged by id.
//!
//! Either source may fail or time out. The failed source contributes nothing
//! and is recorded in the trace with zero elapsed time and zero results; the
//! request only ends early when both sources fail or the union is empty.

use crate::capability::{Embedder, LexicalHit, LexicalSearch, VectorHit, VectorSearch};
use anyhow::Context;
use nexus_core::model::{Candidate, Stage, StageStatus, TraceRecorder};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// A candidate with its raw per-source scores. A missing source scores 0.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedCandidate {
    pub candidate: Candidate,
    pub lexical: f32,
    pub semantic: f32,
}

/// Outcome of one retrieval source.
#[derive(Debug, Clone)]
pub struct SourceRun<T> {
    pub hits: Result<Vec<T>, String>,
    pub elapsed: Duration,
}

impl<T> SourceRun<T> {
    fn record(&self, stage: Stage, trace: &mut TraceRecorder) {
        match &self.hits {
            Ok(hits) => trace.record(stage, self.elapsed, hits.len(), StageStatus::Ok),
            Err(reason) => {
                trace.record_with_note(stage, Duration::ZERO, 0, StageStatus::Failed, reason);
            }
        }
    }
}

/// Both retrieval results for one query.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub lexical: SourceRun<LexicalHit>,
    pub vector: SourceRun<VectorHit>,
}

impl Retrieval {
    /// Append one trace entry per source.
    pub fn record(&self, trace: &mut TraceRecorder) {
        self.lexical.record(Stage::LexicalFilter, trace);
        self.vector.record(Stage::VectorSearch, trace);
    }

    /// Union of both sources, or `None` when neither produced a result set.
    #[must_use]
    pub fn merge(self) -> Option<Vec<MergedCandidate>> {
        match (self.lexical.hits, self.vector.hits) {
            (Err(_), Err(_)) => None,
            (lexical, vector) => Some(merge_candidates(
                lexical.unwrap_or_default(),
                vector.unwrap_or_default(),
            )),
        }
    }
}

/// Run lexical and vector retrieval concurrently, each bounded by `limit`.
///
/// The vector side embeds `text` first; the embed call shares the vector
/// source's timeout.
#[instrument(skip_all, fields(limit, min_similarity))]
pub async fn retrieve(
    lexical: &dyn LexicalSearch,
    vector: &dyn VectorSearch,
    embedder: &dyn Embedder,
    text: &str,
    limit: usize,
    min_similarity: f32,
    budget: Duration,
) -> Retrieval {
    let lexical_call = async {
        lexical
            .search(text, limit)
            .await
            .context("lexical search failed")
    };
    let vector_call = async {
        let embedding = embedder.embed(text).await.context("query embedding failed")?;
        vector
            .search(&embedding, min_similarity, limit)
            .await
            .context("vector search failed")
    };

    let (lexical, vector) = tokio::join!(
        timed("lexical", budget, lexical_call),
        timed("vector", budget, vector_call)
    );
    debug!(
        lexical = lexical.hits.as_ref().map_or(0, Vec::len),
        vector = vector.hits.as_ref().map_or(0, Vec::len),
        "retrieval finished"
    );
    Retrieval { lexical, vector }
}

/// Run only the lexical source; the vector stage is skipped.
pub async fn retrieve_lexical(
    lexical: &dyn LexicalSearch,
    text: &str,
    limit: usize,
    budget: Duration,
) -> SourceRun<LexicalHit> {
    timed("lexical", budget, async {
        lexical
            .search(text, limit)
            .await
            .context("lexical search failed")
    })
    .await
}

/// Record a lexical-only run in the trace.
pub fn record_lexical(run: &SourceRun<LexicalHit>, trace: &mut TraceRecorder) {
    run.record(Stage::LexicalFilter, trace);
}

async fn timed<T>(
    source: &'static str,
    budget: Duration,
    call: impl Future<Output = anyhow::Result<Vec<T>>>,
) -> SourceRun<T> {
    let started = Instant::now();
    let hits = match timeout(budget, call).await {
        Ok(Ok(hits)) => Ok(hits),
        Ok(Err(e)) => {
            warn!(source, "retrieval source failed: {e:#}");
            Err(format!("{e:#}"))
        }
        Err(_) => {
            warn!(source, budget_ms = budget.as_millis(), "retrieval source timed out");
            Err(format!("timed out after {}ms", budget.as_millis()))
        }
    };
    SourceRun {
        hits,
        elapsed: started.elapsed(),
    }
}

/// Union of lexical and vector hits keyed by candidate id, ordered by id.
///
/// A candidate found by both sources appears once with both scores. When a
/// source reports the same id twice the higher score wins. The vector copy of
/// a candidate is preferred when the lexical copy lacks an embedding.
#[must_use]
pub fn merge_candidates(lexical: Vec<LexicalHit>, vector: Vec<VectorHit>) -> Vec<MergedCandidate> {
    let mut merged: BTreeMap<String, MergedCandidate> = BTreeMap::new();

    for hit in lexical {
        let score = unit(hit.score);
        merged
            .entry(hit.candidate.id.clone())
            .and_modify(|entry| entry.lexical = entry.lexical.max(score))
            .or_insert(MergedCandidate {
                candidate: hit.candidate,
                lexical: score,
                semantic: 0.0,
            });
    }

    for hit in vector {
        let similarity = unit(hit.similarity);
        match merged.get_mut(&hit.candidate.id) {
            Some(entry) => {
                entry.semantic = entry.semantic.max(similarity);
                if entry.candidate.embedding.is_none() && hit.candidate.embedding.is_some() {
                    entry.candidate.embedding = hit.candidate.embedding;
                }
                if entry.candidate.graph_embedding.is_none() {
                    entry.candidate.graph_embedding = hit.candidate.graph_embedding;
                }
            }
            None => {
                merged.insert(
                    hit.candidate.id.clone(),
                    MergedCandidate {
                        candidate: hit.candidate,
                        lexical: 0.0,
                        semantic: similarity,
                    },
                );
            }
        }
    }

    merged.into_values().collect()
}

fn unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
