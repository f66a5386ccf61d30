//! Feature-hashing embedder.
//!
//! Every term key is hashed into one of `dims` buckets with a hash-derived
//! sign, and the result is L2-normalized. Texts sharing vocabulary land close
//! together; unrelated texts are near-orthogonal.

use crate::capability::Embedder;
use anyhow::Result;
use async_trait::async_trait;
use nexus_core::text;

pub const DEFAULT_DIMS: usize = 256;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingEmbedder {
    dims: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMS)
    }
}

impl HashingEmbedder {
    /// `dims` is raised to at least 1.
    #[must_use]
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    #[must_use]
    pub const fn dims(&self) -> usize {
        self.dims
    }

    /// Embed synchronously. Text without terms maps to the zero vector.
    #[must_use]
    pub fn embed_text(&self, input: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dims];
        for term in text::tokenize(input) {
            let hash = fnv1a(text::term_key(&term).as_bytes());
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (hash % self.dims as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::vector::cosine_similarity;

    #[test]
    fn embeddings_are_unit_length_and_deterministic() {
        let embedder = HashingEmbedder::default();
        let first = embedder.embed_text("zero-knowledge identity verification");
        let second = embedder.embed_text("zero-knowledge identity verification");
        assert_eq!(first, second);
        assert_eq!(first.len(), DEFAULT_DIMS);

        let norm: f32 = first.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_vocabulary_is_more_similar() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed_text("cryptography");
        let related = embedder.embed_text("cryptographic proofs for identity");
        let unrelated = embedder.embed_text("autonomous vehicle navigation");

        let related_sim = cosine_similarity(&query, &related).expect("comparable");
        let unrelated_sim = cosine_similarity(&query, &unrelated).expect("comparable");
        assert!(related_sim > unrelated_sim);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(8);
        assert!(embedder.embed_text("the of a").iter().all(|v| *v == 0.0));
    }
}
