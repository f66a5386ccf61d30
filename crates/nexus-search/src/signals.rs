//! Secondary signals: coherence judgment, graph similarity, and
//! pseudo-relevance feedback.
//!
//! Only the top-K candidates by provisional blend are scored. External calls
//! go through a shared [`Semaphore`] so fan-out to a judgment service is
//! capped regardless of candidate count. Every call has its own timeout, and
//! the request deadline abandons whatever is still in flight. Abandoned and
//! failed calls surface as [`SignalOutcome`] values, never as errors.

use crate::candidates::MergedCandidate;
use crate::capability::{CoherenceJudge, GraphEmbeddings};
use crate::fusion::SignalInput;
use anyhow::{Result, anyhow};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use nexus_core::config::ScoringConfig;
use nexus_core::model::{Signal, SignalOutcome, SignalWeights, Stage, StageStatus, TraceRecorder};
use nexus_core::vector::{centroid, unit_similarity};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, instrument, warn};

/// Highest rating a coherence judge may return.
pub const MAX_RATING: f32 = 10.0;

/// Run `call(0..count)` with at most `pool`'s permits in flight.
///
/// Each call is bounded by `per_call` once it holds a permit. Calls that have
/// not finished when `deadline` passes are abandoned and reported as timed
/// out. Results are indexed by call, not by completion order.
pub async fn bounded_calls<T, F, Fut>(
    pool: &Semaphore,
    count: usize,
    per_call: Duration,
    deadline: Instant,
    call: F,
) -> Vec<SignalOutcome<T>>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut results: Vec<SignalOutcome<T>> = (0..count).map(|_| SignalOutcome::TimedOut).collect();

    let mut pending: FuturesUnordered<_> = (0..count)
        .map(|idx| {
            let fut = call(idx);
            async move {
                let result = match pool.acquire().await {
                    Ok(permit) => {
                        let result = match timeout(per_call, fut).await {
                            Ok(Ok(value)) => SignalOutcome::Success(value),
                            Ok(Err(e)) => SignalOutcome::Failed(format!("{e:#}")),
                            Err(_) => SignalOutcome::TimedOut,
                        };
                        drop(permit);
                        result
                    }
                    Err(_) => SignalOutcome::Failed("worker pool closed".to_string()),
                };
                (idx, result)
            }
        })
        .collect();

    let drain = async {
        while let Some((idx, result)) = pending.next().await {
            results[idx] = result;
        }
    };
    if timeout_at(deadline, drain).await.is_err() {
        warn!(count, "request deadline reached, abandoning in-flight signal calls");
    }

    results
}

/// Provisional `lexical`/`semantic` blend used to pick the top-K.
#[must_use]
pub fn provisional_score(candidate: &MergedCandidate, config: &ScoringConfig) -> f32 {
    config.provisional_lexical * candidate.lexical + config.provisional_semantic * candidate.semantic
}

/// Keep the `config.top_k` best candidates by provisional blend, ties by id.
#[must_use]
pub fn select_top_k(
    mut candidates: Vec<MergedCandidate>,
    config: &ScoringConfig,
) -> Vec<MergedCandidate> {
    candidates.sort_by(|left, right| {
        provisional_score(right, config)
            .total_cmp(&provisional_score(left, config))
            .then_with(|| left.candidate.id.cmp(&right.candidate.id))
    });
    candidates.truncate(config.top_k);
    candidates
}

/// Outcomes of one signal stage plus its wall time.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSignals {
    pub outcomes: Vec<SignalOutcome>,
    pub elapsed: Duration,
    pub note: Option<String>,
}

impl StageSignals {
    #[must_use]
    pub fn degraded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_degraded()).count()
    }

    pub fn record(&self, stage: Stage, trace: &mut TraceRecorder) {
        let degraded = self.degraded();
        let status = if degraded == 0 {
            StageStatus::Ok
        } else {
            StageStatus::Degraded
        };
        let note = match (&self.note, degraded) {
            (Some(note), _) => Some(note.clone()),
            (None, 0) => None,
            (None, n) => Some(format!("{n} of {} calls fell back", self.outcomes.len())),
        };
        let scored = self.outcomes.len() - degraded;
        match note {
            Some(note) => trace.record_with_note(stage, self.elapsed, scored, status, note),
            None => trace.record(stage, self.elapsed, scored, status),
        }
    }
}

/// Coherence and graph outcomes for the top-K, index-aligned with the input.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalSignals {
    pub coherence: StageSignals,
    pub graph: StageSignals,
}

/// Drives the external signal calls for one request.
pub struct SignalScorer<'a> {
    pub judge: &'a dyn CoherenceJudge,
    pub graph: &'a dyn GraphEmbeddings,
    pub pool: &'a Semaphore,
    pub config: &'a ScoringConfig,
}

impl SignalScorer<'_> {
    /// Score coherence and graph similarity concurrently.
    #[instrument(skip_all, fields(candidates = top.len()))]
    pub async fn score(
        &self,
        query: &str,
        top: &[MergedCandidate],
        deadline: Instant,
    ) -> ExternalSignals {
        let (coherence, graph) = tokio::join!(
            self.coherence(query, top, deadline),
            self.graph_similarity(top, deadline)
        );
        ExternalSignals { coherence, graph }
    }

    /// Judge rating normalized to `[0, 1]`.
    pub async fn coherence(
        &self,
        query: &str,
        top: &[MergedCandidate],
        deadline: Instant,
    ) -> StageSignals {
        let started = Instant::now();
        let judge = self.judge;
        let results = bounded_calls(
            self.pool,
            top.len(),
            self.config.coherence_timeout(),
            deadline,
            |idx| {
                let text = top[idx].candidate.judge_text();
                async move { normalize_rating(judge.score(query, &text).await?) }
            },
        )
        .await;

        StageSignals {
            outcomes: results,
            elapsed: started.elapsed(),
            note: None,
        }
    }

    /// Similarity of each candidate's graph embedding to the centroid of the
    /// top `prf_top_m` graph embeddings.
    ///
    /// Embeddings carried on the candidate are used as-is; the rest are looked
    /// up. A candidate with no graph embedding scores 0.
    pub async fn graph_similarity(&self, top: &[MergedCandidate], deadline: Instant) -> StageSignals {
        let started = Instant::now();
        let lookup = self.graph;
        let resolved = bounded_calls(
            self.pool,
            top.len(),
            self.config.graph_timeout(),
            deadline,
            |idx| {
                let candidate = &top[idx].candidate;
                async move {
                    match &candidate.graph_embedding {
                        Some(stored) => Ok(Some(stored.clone())),
                        None => lookup.embedding_for(&candidate.id).await,
                    }
                }
            },
        )
        .await;

        let query_graph = centroid(
            resolved
                .iter()
                .filter_map(|result| result.success().and_then(Option::as_deref))
                .take(self.config.prf_top_m),
        );
        let note = query_graph
            .is_none()
            .then(|| "no graph embeddings among top candidates".to_string());

        let outcomes = resolved
            .into_iter()
            .map(|result| {
                result.map(|embedding| match (query_graph.as_deref(), embedding) {
                    (Some(query), Some(embedding)) => unit_similarity(query, &embedding),
                    _ => 0.0,
                })
            })
            .collect();

        StageSignals {
            outcomes,
            elapsed: started.elapsed(),
            note,
        }
    }
}

/// Map a `0..=10` rating onto `[0, 1]`; anything else is malformed.
///
/// # Errors
///
/// Returns an error for non-finite or out-of-range ratings.
pub fn normalize_rating(rating: f32) -> Result<f32> {
    if !rating.is_finite() || !(0.0..=MAX_RATING).contains(&rating) {
        return Err(anyhow!("malformed coherence rating {rating}"));
    }
    Ok(rating / MAX_RATING)
}

/// Pseudo-relevance feedback over an already-scored candidate set.
///
/// Inputs are ranked by `weights` with the feedback signal zeroed; the dense
/// embeddings of the top `top_m` are averaged and every input is scored by
/// its similarity to that average. Inputs without an embedding score 0.
#[must_use]
pub fn pseudo_relevance(inputs: &[SignalInput], weights: &SignalWeights, top_m: usize) -> StageSignals {
    let started = Instant::now();
    let blend = |input: &SignalInput| weights.weighted_sum(&input.scores.with(Signal::Feedback, 0.0));
    let mut order: Vec<&SignalInput> = inputs.iter().collect();
    order.sort_by(|left, right| {
        blend(*right)
            .total_cmp(&blend(*left))
            .then_with(|| left.candidate.id.cmp(&right.candidate.id))
    });

    let expansion = centroid(
        order
            .iter()
            .take(top_m)
            .filter_map(|input| input.candidate.embedding.as_deref()),
    );
    debug!(
        contributors = top_m.min(inputs.len()),
        has_expansion = expansion.is_some(),
        "pseudo-relevance vector built"
    );

    let outcomes = inputs
        .iter()
        .map(|input| {
            let similarity = match (&expansion, &input.candidate.embedding) {
                (Some(expansion), Some(embedding)) => unit_similarity(expansion, embedding),
                _ => 0.0,
            };
            SignalOutcome::Success(similarity)
        })
        .collect();

    StageSignals {
        outcomes,
        elapsed: started.elapsed(),
        note: expansion
            .is_none()
            .then(|| "no dense embeddings among top candidates".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use nexus_core::model::{Candidate, ScoreVector};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn merged(id: &str, lexical: f32, semantic: f32) -> MergedCandidate {
        MergedCandidate {
            candidate: Candidate::new(id, format!("title {id}"), "abstract"),
            lexical,
            semantic,
        }
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    #[test]
    fn top_k_uses_provisional_blend_and_id_ties() {
        let config = ScoringConfig {
            top_k: 2,
            ..ScoringConfig::default()
        };
        let top = select_top_k(
            vec![
                merged("c", 1.0, 0.0),
                merged("b", 0.0, 1.0),
                merged("a", 0.0, 1.0),
            ],
            &config,
        );
        let ids: Vec<_> = top.iter().map(|m| m.candidate.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn ratings_outside_scale_are_malformed() {
        assert!((normalize_rating(7.0).expect("valid") - 0.7).abs() < 1e-6);
        assert!(normalize_rating(11.0).is_err());
        assert!(normalize_rating(f32::NAN).is_err());
    }

    #[tokio::test]
    async fn bounded_calls_respects_pool_size() {
        let pool = Semaphore::new(2);
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let results = bounded_calls(&pool, 8, Duration::from_secs(1), far_deadline(), |idx| {
            let active = &active;
            let peak = &peak;
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(idx)
            }
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(results[5], SignalOutcome::Success(5));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_calls_time_out_individually() {
        let pool = Semaphore::new(4);
        let results = bounded_calls(&pool, 3, Duration::from_millis(50), far_deadline(), |idx| async move {
            if idx == 1 {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            if idx == 2 {
                bail!("judge unavailable");
            }
            Ok(idx)
        })
        .await;

        assert_eq!(results[0], SignalOutcome::Success(0));
        assert_eq!(results[1], SignalOutcome::TimedOut);
        assert!(matches!(&results[2], SignalOutcome::Failed(reason) if reason.contains("unavailable")));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_abandons_in_flight_calls() {
        let pool = Semaphore::new(4);
        let deadline = Instant::now() + Duration::from_millis(100);
        let results = bounded_calls(&pool, 2, Duration::from_secs(10), deadline, |idx| async move {
            if idx == 0 {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Ok(idx)
        })
        .await;

        assert_eq!(results[0], SignalOutcome::TimedOut);
        assert_eq!(results[1], SignalOutcome::Success(1));
    }

    struct FixedJudge(f32);

    #[async_trait]
    impl CoherenceJudge for FixedJudge {
        async fn score(&self, _: &str, _: &str) -> Result<f32> {
            Ok(self.0)
        }
    }

    struct NoGraph;

    #[async_trait]
    impl GraphEmbeddings for NoGraph {
        async fn embedding_for(&self, _: &str) -> Result<Option<Vec<f32>>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn missing_graph_embeddings_score_zero_without_degrading() {
        let pool = Semaphore::new(4);
        let config = ScoringConfig::default();
        let scorer = SignalScorer {
            judge: &FixedJudge(8.0),
            graph: &NoGraph,
            pool: &pool,
            config: &config,
        };
        let top = vec![
            MergedCandidate {
                candidate: Candidate::new("1", "a", "b").with_graph_embedding(vec![1.0, 0.0]),
                lexical: 1.0,
                semantic: 0.5,
            },
            merged("2", 1.0, 0.4),
        ];

        let signals = scorer.score("query", &top, far_deadline()).await;
        assert_eq!(signals.coherence.outcomes, vec![SignalOutcome::Success(0.8); 2]);
        assert_eq!(signals.graph.outcomes[0], SignalOutcome::Success(1.0));
        assert_eq!(signals.graph.outcomes[1], SignalOutcome::Success(0.0));
        assert_eq!(signals.graph.degraded(), 0);
    }

    #[test]
    fn prf_scores_against_top_blend_centroid() {
        let inputs = vec![
            SignalInput::new(
                Candidate::new("1", "t", "a").with_embedding(vec![1.0, 0.0]),
                ScoreVector::default().with(Signal::Lexical, 1.0),
            ),
            SignalInput::new(
                Candidate::new("2", "t", "a").with_embedding(vec![-1.0, 0.0]),
                ScoreVector::default(),
            ),
            SignalInput::new(
                Candidate::new("3", "t", "a"),
                ScoreVector::default().with(Signal::Lexical, 0.5),
            ),
        ];
        let prf = pseudo_relevance(&inputs, &SignalWeights::default(), 1);

        assert_eq!(prf.outcomes[0], SignalOutcome::Success(1.0));
        assert_eq!(prf.outcomes[1], SignalOutcome::Success(0.0));
        assert_eq!(prf.outcomes[2], SignalOutcome::Success(0.0));
        assert!(prf.note.is_none());
    }
}
