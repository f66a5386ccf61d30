//! In-memory document index.

use crate::backend::hashing::HashingEmbedder;
use crate::capability::{GraphEmbeddings, LexicalHit, LexicalSearch, VectorHit, VectorSearch};
use anyhow::{Context, Result};
use async_trait::async_trait;
use nexus_core::model::Candidate;
use nexus_core::text;
use nexus_core::vector::unit_similarity;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;

/// Documents kept in memory, ordered by id.
///
/// Lexical search reports the binary matched indicator: a document matches
/// when it shares at least one term key with the query.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    documents: Vec<Candidate>,
    keys: Vec<HashSet<String>>,
}

impl MemoryIndex {
    /// Build an index. A later document replaces an earlier one with the same id.
    #[must_use]
    pub fn new(documents: impl IntoIterator<Item = Candidate>) -> Self {
        let mut documents: Vec<Candidate> = documents.into_iter().collect();
        documents.sort_by(|left, right| left.id.cmp(&right.id));
        documents.dedup_by(|later, earlier| {
            if later.id == earlier.id {
                std::mem::swap(later, earlier);
                true
            } else {
                false
            }
        });

        let keys = documents
            .iter()
            .map(|doc| text::term_keys(&format!("{} {}", doc.title, doc.abstract_text)))
            .collect();
        Self { documents, keys }
    }

    /// Load a JSON array of documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let documents: Vec<Candidate> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Self::new(documents))
    }

    /// Fill in missing dense embeddings from the document text.
    #[must_use]
    pub fn with_embeddings(mut self, embedder: &HashingEmbedder) -> Self {
        for doc in &mut self.documents {
            if doc.embedding.is_none() {
                doc.embedding = Some(embedder.embed_text(&doc.embedding_text()));
            }
        }
        self
    }

    #[must_use]
    pub fn documents(&self) -> &[Candidate] {
        &self.documents
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Candidate> {
        self.documents
            .binary_search_by(|doc| doc.id.as_str().cmp(id))
            .ok()
            .map(|idx| &self.documents[idx])
    }

    #[must_use]
    pub fn lexical_matches(&self, query: &str, limit: usize) -> Vec<LexicalHit> {
        let query_keys = text::term_keys(query);
        self.documents
            .iter()
            .zip(&self.keys)
            .filter(|(_, keys)| !keys.is_disjoint(&query_keys))
            .take(limit)
            .map(|(doc, _)| LexicalHit::matched(doc.clone()))
            .collect()
    }

    #[must_use]
    pub fn nearest(&self, embedding: &[f32], min_similarity: f32, limit: usize) -> Vec<VectorHit> {
        let mut hits: Vec<VectorHit> = self
            .documents
            .iter()
            .filter_map(|doc| {
                let similarity = unit_similarity(embedding, doc.embedding.as_deref()?);
                (similarity >= min_similarity).then(|| VectorHit {
                    candidate: doc.clone(),
                    similarity,
                })
            })
            .collect();

        hits.sort_by(|left, right| {
            right
                .similarity
                .partial_cmp(&left.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| left.candidate.id.cmp(&right.candidate.id))
        });
        hits.truncate(limit);
        hits
    }
}

#[async_trait]
impl LexicalSearch for MemoryIndex {
    async fn search(&self, text: &str, limit: usize) -> Result<Vec<LexicalHit>> {
        Ok(self.lexical_matches(text, limit))
    }
}

#[async_trait]
impl VectorSearch for MemoryIndex {
    async fn search(
        &self,
        embedding: &[f32],
        min_similarity: f32,
        limit: usize,
    ) -> Result<Vec<VectorHit>> {
        Ok(self.nearest(embedding, min_similarity, limit))
    }
}

#[async_trait]
impl GraphEmbeddings for MemoryIndex {
    async fn embedding_for(&self, candidate_id: &str) -> Result<Option<Vec<f32>>> {
        Ok(self
            .get(candidate_id)
            .and_then(|doc| doc.graph_embedding.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::config::RetrievalConfig;

    fn index() -> MemoryIndex {
        MemoryIndex::new([
            Candidate::new("b", "Quantum Computing Method", "molecular simulation")
                .with_embedding(vec![0.0, 1.0]),
            Candidate::new("a", "Cryptographic Ledger", "blockchain proofs")
                .with_embedding(vec![1.0, 0.0])
                .with_graph_embedding(vec![0.3, 0.7]),
            Candidate::new("c", "Identity Verification", "cryptography without disclosure"),
        ])
    }

    #[test]
    fn documents_are_sorted_and_deduplicated() {
        let index = MemoryIndex::new([
            Candidate::new("2", "old", ""),
            Candidate::new("1", "one", ""),
            Candidate::new("2", "new", ""),
        ]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("2").map(|doc| doc.title.as_str()), Some("new"));
    }

    #[test]
    fn lexical_match_is_binary_and_uses_term_keys() {
        let hits = index().lexical_matches("cryptography", 10);
        let ids: Vec<_> = hits.iter().map(|hit| hit.candidate.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert!(hits.iter().all(|hit| hit.score == 1.0));
        assert_eq!(index().lexical_matches("cryptography", 1).len(), 1);
    }

    #[test]
    fn nearest_skips_documents_without_embeddings() {
        let hits = index().nearest(&[1.0, 0.0], 0.0, 10);
        let ids: Vec<_> = hits.iter().map(|hit| hit.candidate.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].similarity, 0.0);

        assert_eq!(index().nearest(&[1.0, 0.0], 0.75, 10).len(), 1);
    }

    #[test]
    fn orthogonal_documents_miss_the_default_threshold() {
        let min_similarity = RetrievalConfig::default().min_similarity;
        let hits = index().nearest(&[1.0, 0.0], min_similarity, 10);
        let ids: Vec<_> = hits.iter().map(|hit| hit.candidate.id.as_str()).collect();
        assert_eq!(ids, ["a"]);
    }

    #[tokio::test]
    async fn graph_lookup_returns_stored_embedding() {
        let index = index();
        assert_eq!(
            index.embedding_for("a").await.expect("lookup"),
            Some(vec![0.3, 0.7])
        );
        assert_eq!(index.embedding_for("b").await.expect("lookup"), None);
        assert_eq!(index.embedding_for("zzz").await.expect("lookup"), None);
    }

    #[test]
    fn with_embeddings_fills_only_missing() {
        let index = index().with_embeddings(&HashingEmbedder::new(16));
        assert_eq!(index.get("a").and_then(|d| d.embedding.clone()), Some(vec![1.0, 0.0]));
        assert_eq!(index.get("c").and_then(|d| d.embedding.as_ref().map(Vec::len)), Some(16));
    }
}
