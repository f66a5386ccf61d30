//! Pipeline orchestration.
//!
//! One [`Pipeline::run`] call takes a request through preprocessing,
//! candidate generation, signal scoring, weight combination, and MMR
//! selection, timing every stage into a [`PipelineTrace`]. Only invalid
//! requests are errors. Failing backends degrade signals, and a request with
//! no candidates returns an empty response.

use crate::backend::{HashingEmbedder, TermOverlapJudge};
use crate::candidates::{record_lexical, retrieve, retrieve_lexical};
use crate::capability::{
    CoherenceJudge, Embedder, GraphEmbeddings, LexicalSearch, PairwiseSimilarity, VectorSearch,
};
use crate::diversity::{EmbeddingSimilarity, mmr_select};
use crate::expansion::QueryPreprocessor;
use crate::fusion::{SignalInput, WeightCombiner};
use crate::signals::{SignalScorer, pseudo_relevance, select_top_k};
use nexus_core::config::NexusConfig;
use nexus_core::error::{ErrorCode, PipelineError};
use nexus_core::model::{
    PipelineTrace, ProfileRegistry, ProfileSelector, Query, QueryContext, QueryOptions,
    RankedResult, ScoreVector, SearchRequest, SearchResponse, Signal, Stage, StageStatus,
    TraceRecorder, WeightProfile,
};
use nexus_core::text;
use nexus_feedback::{NEUTRAL_HISTORY, Outcome, OutcomeAction, ProfileStore, StaticProfileStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{Span, debug, info, instrument, warn};

/// Stages that never run once candidate generation comes back empty.
const AFTER_MERGE: [Stage; 5] = [
    Stage::CoherenceScoring,
    Stage::GraphSimilarity,
    Stage::PrfExpansion,
    Stage::Weighting,
    Stage::MmrDiversity,
];

/// Stages skipped by lexical-only requests.
const LEXICAL_ONLY_SKIPS: [Stage; 7] = [
    Stage::VectorSearch,
    Stage::CandidateMerge,
    Stage::CoherenceScoring,
    Stage::GraphSimilarity,
    Stage::PrfExpansion,
    Stage::Weighting,
    Stage::MmrDiversity,
];

/// The ranking pipeline and the capabilities it runs against.
///
/// Cheap to share behind an [`Arc`]; runs do not mutate it. The worker pool
/// is shared by every concurrent run.
pub struct Pipeline {
    lexical: Arc<dyn LexicalSearch>,
    vector: Arc<dyn VectorSearch>,
    embedder: Arc<dyn Embedder>,
    judge: Arc<dyn CoherenceJudge>,
    graph: Arc<dyn GraphEmbeddings>,
    similarity: Arc<dyn PairwiseSimilarity>,
    store: Arc<dyn ProfileStore>,
    config: NexusConfig,
    registry: ProfileRegistry,
    preprocessor: QueryPreprocessor,
    pool: Arc<Semaphore>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("workers", &self.config.scoring.workers)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    #[must_use]
    pub fn builder(config: NexusConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    #[must_use]
    pub const fn config(&self) -> &NexusConfig {
        &self.config
    }

    #[must_use]
    pub const fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    #[must_use]
    pub fn store(&self) -> &dyn ProfileStore {
        self.store.as_ref()
    }

    /// Apply configured defaults to `request` and validate the result.
    ///
    /// # Errors
    ///
    /// Rejects an empty query, a limit outside `1..=search.max_limit`, a
    /// semantic threshold outside `[0, 1]`, and an unregistered profile name.
    pub fn resolve_options(&self, request: &SearchRequest) -> Result<QueryOptions, PipelineError> {
        if request.query.trim().is_empty() {
            return Err(PipelineError::validation(
                ErrorCode::EmptyQuery,
                "query text is empty",
            ));
        }

        let max_limit = self.config.search.max_limit;
        let limit = request.limit.unwrap_or(self.config.search.default_limit);
        if limit == 0 || limit > max_limit {
            return Err(PipelineError::validation(
                ErrorCode::InvalidLimit,
                format!("limit {limit} is outside 1..={max_limit}"),
            ));
        }

        if let Some(threshold) = request.semantic_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(PipelineError::validation(
                    ErrorCode::InvalidThreshold,
                    format!("semantic threshold {threshold} is outside [0, 1]"),
                ));
            }
        }

        let profile = request.profile.clone().unwrap_or_else(|| {
            if self.config.feedback.adaptive {
                ProfileSelector::Adaptive
            } else {
                ProfileSelector::named(self.config.search.default_profile.clone())
            }
        });
        if let ProfileSelector::Named(name) = &profile {
            self.registry.get(name)?;
        }

        Ok(QueryOptions {
            limit,
            semantic_threshold: request.semantic_threshold,
            profile,
            expand: request.expand_query,
            full_pipeline: request.full_pipeline,
        })
    }

    /// The weights a request will be combined with.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownProfile`] for an unregistered name.
    pub fn resolve_profile(
        &self,
        selector: &ProfileSelector,
        context: &QueryContext,
    ) -> Result<WeightProfile, PipelineError> {
        match selector {
            ProfileSelector::Named(name) => self.registry.get(name).cloned(),
            ProfileSelector::Adaptive => Ok(self.store.profile_for(context)),
        }
    }

    /// Rank documents for `request`.
    ///
    /// # Errors
    ///
    /// Only request validation fails; see [`Pipeline::resolve_options`].
    #[instrument(skip_all, fields(query = %request.query, profile = tracing::field::Empty))]
    pub async fn run(&self, request: &SearchRequest) -> Result<SearchResponse, PipelineError> {
        let options = self.resolve_options(request)?;
        let deadline = Instant::now() + self.config.search.request_deadline();
        let mut trace = TraceRecorder::start();

        let started = Instant::now();
        let preprocessed = self.preprocessor.preprocess(&request.query, options.expand);
        if options.expand {
            trace.record(
                Stage::QueryExpansion,
                started.elapsed(),
                preprocessed.added_terms(),
                StageStatus::Ok,
            );
        } else {
            trace.skip(Stage::QueryExpansion);
        }

        let profile = self.resolve_profile(&options.profile, &preprocessed.context)?;
        Span::current().record("profile", profile.name.as_str());

        let context = preprocessed.context;
        let query = Query {
            raw: preprocessed.normalized,
            expanded: preprocessed.expanded,
            options,
        };

        let ranked = if query.options.full_pipeline {
            self.rank(&query, &profile, deadline, &mut trace).await
        } else {
            self.rank_lexical(&query, deadline, &mut trace).await
        };
        let results = finish_results(&query, ranked);
        let trace = trace.finish();

        log_trace(&trace);
        info!(
            results = results.len(),
            total_ms = trace.total.as_millis(),
            degraded = trace.degraded(),
            "search finished"
        );

        Ok(SearchResponse {
            query: query.raw,
            expanded_query: query.expanded,
            profile: profile.name,
            context,
            results,
            trace,
        })
    }

    /// Pass an outcome for a finished run to the profile store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot persist the outcome.
    pub fn record_outcome(&self, context: &QueryContext, outcome: &Outcome) -> anyhow::Result<()> {
        self.store.record(context, outcome)
    }

    fn retrieval_budget(&self, deadline: Instant) -> Duration {
        self.config
            .retrieval
            .timeout()
            .min(deadline.saturating_duration_since(Instant::now()))
    }

    async fn rank(
        &self,
        query: &Query,
        profile: &WeightProfile,
        deadline: Instant,
        trace: &mut TraceRecorder,
    ) -> Vec<RankedResult> {
        let retrieval = retrieve(
            self.lexical.as_ref(),
            self.vector.as_ref(),
            self.embedder.as_ref(),
            query.text(),
            self.config.retrieval.candidate_cap,
            self.config.retrieval.min_similarity,
            self.retrieval_budget(deadline),
        )
        .await;
        retrieval.record(trace);

        let started = Instant::now();
        let Some(merged) = retrieval.merge() else {
            warn!("every retrieval source failed, returning no results");
            trace.record_with_note(
                Stage::CandidateMerge,
                Duration::ZERO,
                0,
                StageStatus::Skipped,
                "no retrieval source succeeded",
            );
            skip_all(trace, &AFTER_MERGE);
            return Vec::new();
        };

        let combiner = WeightCombiner::new(profile.clone(), query.options.semantic_threshold);
        let merged = combiner.apply_threshold(merged, |candidate| candidate.semantic);
        trace.record(Stage::CandidateMerge, started.elapsed(), merged.len(), StageStatus::Ok);
        if merged.is_empty() {
            info!("no candidates survived generation");
            skip_all(trace, &AFTER_MERGE);
            return Vec::new();
        }

        let scoring = &self.config.scoring;
        let top = select_top_k(merged, scoring);
        let scorer = SignalScorer {
            judge: self.judge.as_ref(),
            graph: self.graph.as_ref(),
            pool: &self.pool,
            config: scoring,
        };
        let external = scorer.score(&query.raw, &top, deadline).await;
        external.coherence.record(Stage::CoherenceScoring, trace);
        external.graph.record(Stage::GraphSimilarity, trace);

        let mut inputs: Vec<SignalInput> = top
            .into_iter()
            .zip(external.coherence.outcomes.iter().zip(&external.graph.outcomes))
            .map(|(merged, (coherence, graph))| {
                let historical = self
                    .store
                    .historical_score(&merged.candidate.id)
                    .unwrap_or(NEUTRAL_HISTORY);
                let scores = ScoreVector::default()
                    .with(Signal::Lexical, merged.lexical)
                    .with(Signal::Semantic, merged.semantic)
                    .with(Signal::HistoricalFeedback, historical);
                let mut input = SignalInput::new(merged.candidate, scores);
                input.resolve(Signal::Coherence, coherence, scoring.coherence_fallback);
                input.resolve(Signal::Graph, graph, 0.0);
                input
            })
            .collect();

        let prf = pseudo_relevance(&inputs, &profile.weights, scoring.prf_top_m);
        prf.record(Stage::PrfExpansion, trace);
        for (input, outcome) in inputs.iter_mut().zip(&prf.outcomes) {
            input.resolve(Signal::Feedback, outcome, 0.0);
        }

        let started = Instant::now();
        let combined = combiner.combine(inputs);
        trace.record(Stage::Weighting, started.elapsed(), combined.len(), StageStatus::Ok);

        let started = Instant::now();
        let selected = mmr_select(
            combined,
            query.options.limit,
            self.config.diversity.coefficient,
            self.similarity.as_ref(),
        );
        trace.record(Stage::MmrDiversity, started.elapsed(), selected.len(), StageStatus::Ok);
        selected
    }

    /// Lexical candidates only, each scored `lexical = final = 1`.
    async fn rank_lexical(
        &self,
        query: &Query,
        deadline: Instant,
        trace: &mut TraceRecorder,
    ) -> Vec<RankedResult> {
        let run = retrieve_lexical(
            self.lexical.as_ref(),
            query.text(),
            query.options.limit,
            self.retrieval_budget(deadline),
        )
        .await;
        record_lexical(&run, trace);
        skip_all(trace, &LEXICAL_ONLY_SKIPS);

        run.hits
            .unwrap_or_default()
            .into_iter()
            .take(query.options.limit)
            .map(|hit| RankedResult {
                candidate: hit.candidate,
                scores: ScoreVector {
                    lexical: 1.0,
                    final_score: 1.0,
                    ..ScoreVector::default()
                },
                matched_terms: Vec::new(),
                debug: None,
            })
            .collect()
    }
}

/// Build an outcome report for a result the caller accepted or rejected.
///
/// Uses the weights recorded in the result's debug trace, or the standard
/// weights for results ranked without one.
#[must_use]
pub fn outcome_for(result: &RankedResult, action: OutcomeAction) -> Outcome {
    let weights = result
        .debug
        .as_ref()
        .map_or_else(|| WeightProfile::standard().weights, |debug| debug.weights_used);
    Outcome::new(result.id(), action, weights)
        .with_score(result.final_score())
        .with_signals(result.scores)
}

fn finish_results(query: &Query, results: Vec<RankedResult>) -> Vec<RankedResult> {
    results
        .into_iter()
        .map(|mut result| {
            result.scores.final_score = result.scores.final_score.max(0.0);
            result.matched_terms = text::matched_terms(
                query.text(),
                &[
                    result.candidate.title.as_str(),
                    result.candidate.abstract_text.as_str(),
                ],
            );
            result
        })
        .collect()
}

fn skip_all(trace: &mut TraceRecorder, stages: &[Stage]) {
    for &stage in stages {
        trace.skip(stage);
    }
}

fn log_trace(trace: &PipelineTrace) {
    for timing in &trace.stages {
        debug!(
            stage = %timing.stage,
            status = %timing.status,
            results = timing.results,
            elapsed_ms = timing.elapsed.as_secs_f64() * 1000.0,
            note = timing.note.as_deref().unwrap_or(""),
            "stage finished"
        );
    }
}

/// Assembles a [`Pipeline`].
///
/// An index is required. The embedder, coherence judge, pairwise similarity,
/// and profile store default to the offline implementations.
pub struct PipelineBuilder {
    config: NexusConfig,
    lexical: Option<Arc<dyn LexicalSearch>>,
    vector: Option<Arc<dyn VectorSearch>>,
    graph: Option<Arc<dyn GraphEmbeddings>>,
    embedder: Option<Arc<dyn Embedder>>,
    judge: Option<Arc<dyn CoherenceJudge>>,
    similarity: Option<Arc<dyn PairwiseSimilarity>>,
    store: Option<Arc<dyn ProfileStore>>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn new(config: NexusConfig) -> Self {
        Self {
            config,
            lexical: None,
            vector: None,
            graph: None,
            embedder: None,
            judge: None,
            similarity: None,
            store: None,
        }
    }

    /// Use one backend for lexical search, vector search, and graph lookup.
    #[must_use]
    pub fn index<T>(mut self, index: Arc<T>) -> Self
    where
        T: LexicalSearch + VectorSearch + GraphEmbeddings + 'static,
    {
        self.lexical = Some(index.clone());
        self.vector = Some(index.clone());
        self.graph = Some(index);
        self
    }

    #[must_use]
    pub fn lexical(mut self, lexical: Arc<dyn LexicalSearch>) -> Self {
        self.lexical = Some(lexical);
        self
    }

    #[must_use]
    pub fn vector(mut self, vector: Arc<dyn VectorSearch>) -> Self {
        self.vector = Some(vector);
        self
    }

    #[must_use]
    pub fn graph(mut self, graph: Arc<dyn GraphEmbeddings>) -> Self {
        self.graph = Some(graph);
        self
    }

    #[must_use]
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    #[must_use]
    pub fn judge(mut self, judge: Arc<dyn CoherenceJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    #[must_use]
    pub fn similarity(mut self, similarity: Arc<dyn PairwiseSimilarity>) -> Self {
        self.similarity = Some(similarity);
        self
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn ProfileStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validate configuration and assemble the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] for invalid configuration or a
    /// missing index, and profile errors for bad `[profiles]` entries.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        self.config.validate()?;
        let registry = self.config.registry()?;

        let lexical = self.lexical.ok_or_else(|| missing("lexical search"))?;
        let vector = self.vector.ok_or_else(|| missing("vector search"))?;
        let graph = self.graph.ok_or_else(|| missing("graph embedding lookup"))?;

        let store: Arc<dyn ProfileStore> = match self.store {
            Some(store) => store,
            None => {
                let default = registry.get(&self.config.search.default_profile)?.clone();
                Arc::new(StaticProfileStore::new(default))
            }
        };

        Ok(Pipeline {
            lexical,
            vector,
            graph,
            embedder: self
                .embedder
                .unwrap_or_else(|| Arc::new(HashingEmbedder::default())),
            judge: self.judge.unwrap_or_else(|| Arc::new(TermOverlapJudge)),
            similarity: self
                .similarity
                .unwrap_or_else(|| Arc::new(EmbeddingSimilarity)),
            store,
            preprocessor: QueryPreprocessor::from_config(&self.config.expansion),
            pool: Arc::new(Semaphore::new(self.config.scoring.workers)),
            registry,
            config: self.config,
        })
    }
}

fn missing(capability: &str) -> PipelineError {
    PipelineError::Config(format!("no {capability} backend configured"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryIndex;
    use nexus_core::model::Candidate;

    fn pipeline() -> Pipeline {
        let index = MemoryIndex::new([
            Candidate::new("1", "Ledger audit", "distributed ledger audit trail"),
            Candidate::new("2", "Cache warming", "quantum cache warming"),
        ])
        .with_embeddings(&HashingEmbedder::default());
        Pipeline::builder(NexusConfig::default())
            .index(Arc::new(index))
            .build()
            .expect("pipeline")
    }

    #[test]
    fn missing_index_is_a_config_error() {
        let err = Pipeline::builder(NexusConfig::default())
            .build()
            .expect_err("no index");
        assert_eq!(err.code(), ErrorCode::ConfigParseError);
    }

    #[test]
    fn options_take_configured_defaults() {
        let options = pipeline()
            .resolve_options(&SearchRequest::new("ledger"))
            .expect("valid");
        assert_eq!(options.limit, 10);
        assert_eq!(options.profile, ProfileSelector::named("standard"));
        assert!(options.full_pipeline);
    }

    #[test]
    fn invalid_requests_are_rejected_with_codes() {
        let pipeline = pipeline();
        let code = |request: SearchRequest| {
            pipeline
                .resolve_options(&request)
                .expect_err("invalid")
                .code()
        };

        assert_eq!(code(SearchRequest::new("   ")), ErrorCode::EmptyQuery);
        assert_eq!(code(SearchRequest::new("x").with_limit(0)), ErrorCode::InvalidLimit);
        assert_eq!(code(SearchRequest::new("x").with_limit(101)), ErrorCode::InvalidLimit);
        assert_eq!(
            code(SearchRequest::new("x").with_semantic_threshold(f32::NAN)),
            ErrorCode::InvalidThreshold
        );
        assert_eq!(
            code(SearchRequest::new("x").with_profile(ProfileSelector::named("turbo"))),
            ErrorCode::UnknownProfile
        );
    }

    #[tokio::test]
    async fn matched_terms_and_full_trace_are_reported() {
        let response = pipeline()
            .run(&SearchRequest::new("ledger audit"))
            .await
            .expect("run");

        assert_eq!(response.ids()[0], "1");
        assert_eq!(response.results[0].matched_terms, ["ledger", "audit"]);
        assert_eq!(response.trace.stages.len(), 9);
        assert!(response.results.iter().all(|r| r.final_score() >= 0.0));
    }

    #[test]
    fn outcome_uses_weights_from_debug_trace() {
        let result = RankedResult {
            candidate: Candidate::new("9", "t", "a"),
            scores: ScoreVector {
                final_score: 0.7,
                ..ScoreVector::default()
            },
            matched_terms: Vec::new(),
            debug: None,
        };
        let outcome = outcome_for(&result, OutcomeAction::Accepted);
        assert_eq!(outcome.candidate_id, "9");
        assert_eq!(outcome.weights_used, WeightProfile::standard().weights);
        assert!((outcome.score - 0.7).abs() < f32::EPSILON);
    }
}
