//! External capabilities the pipeline consumes.
//!
//! The pipeline never knows which concrete index, model, or service sits
//! behind these traits. Every async call is wrapped in a timeout by the
//! caller; implementations do not need their own.

use anyhow::Result;
use async_trait::async_trait;
use nexus_core::model::Candidate;

/// A full-text hit.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub candidate: Candidate,
    /// `1.0` for a plain match indicator, or a ranked score scaled to `[0, 1]`.
    pub score: f32,
}

impl LexicalHit {
    /// Hit carrying only the binary "matched" indicator.
    #[must_use]
    pub const fn matched(candidate: Candidate) -> Self {
        Self {
            candidate,
            score: 1.0,
        }
    }
}

/// A nearest-neighbor hit.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub candidate: Candidate,
    /// Similarity in `[0, 1]`.
    pub similarity: f32,
}

/// Full-text search over title and abstract.
#[async_trait]
pub trait LexicalSearch: Send + Sync {
    async fn search(&self, text: &str, limit: usize) -> Result<Vec<LexicalHit>>;
}

/// Nearest-neighbor search over dense document embeddings.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search(
        &self,
        embedding: &[f32],
        min_similarity: f32,
        limit: usize,
    ) -> Result<Vec<VectorHit>>;
}

/// Maps query text into the vector space of [`VectorSearch`].
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Relevance judgment of a candidate against a query.
#[async_trait]
pub trait CoherenceJudge: Send + Sync {
    /// Rating on a `0..=10` scale.
    async fn score(&self, query: &str, candidate_text: &str) -> Result<f32>;
}

/// Lookup of citation-graph embeddings.
#[async_trait]
pub trait GraphEmbeddings: Send + Sync {
    async fn embedding_for(&self, candidate_id: &str) -> Result<Option<Vec<f32>>>;
}

/// Pairwise similarity used by diversity selection, in `[0, 1]`.
pub trait PairwiseSimilarity: Send + Sync {
    fn similarity(&self, left: &Candidate, right: &Candidate) -> f32;
}
