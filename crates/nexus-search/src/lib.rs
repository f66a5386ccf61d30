#![forbid(unsafe_code)]
//! nexus-search: the multi-signal ranking pipeline.
//!
//! Stages, in order:
//! 1. [`expansion`]: normalize the query, infer its domain, optionally expand
//! 2. [`candidates`]: lexical and vector retrieval run concurrently, merged by id
//! 3. [`signals`]: coherence, graph, and pseudo-relevance signals for the top-K
//! 4. [`fusion`]: semantic threshold and weighted combination
//! 5. [`diversity`]: MMR selection
//!
//! [`pipeline::Pipeline`] sequences them and records a trace.
//!
//! # Conventions
//!
//! - **Errors**: request validation returns
//!   [`PipelineError`](nexus_core::error::PipelineError); backends return
//!   `anyhow::Result`. A failing backend never fails a request.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod backend;
pub mod candidates;
pub mod capability;
pub mod diversity;
pub mod expansion;
pub mod fusion;
pub mod pipeline;
pub mod signals;

pub use candidates::{MergedCandidate, merge_candidates};
pub use capability::{
    CoherenceJudge, Embedder, GraphEmbeddings, LexicalHit, LexicalSearch, PairwiseSimilarity,
    VectorHit, VectorSearch,
};
pub use diversity::{EmbeddingSimilarity, TitleSimilarity, mmr_select};
pub use expansion::QueryPreprocessor;
pub use fusion::{SignalInput, WeightCombiner};
pub use pipeline::{Pipeline, PipelineBuilder, outcome_for};
