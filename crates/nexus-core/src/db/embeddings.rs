//! Brute-force nearest-neighbor search over stored embeddings.

use crate::db::documents::{decode_vector, read_row};
use crate::model::Candidate;
use crate::vector::unit_similarity;
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::cmp::Ordering;

/// Documents whose embedding cosine similarity to `query` (clamped at 0) is
/// at least `min_similarity`, best first, ties by id.
///
/// # Errors
///
/// Returns an error if the scan fails or a stored embedding is corrupt.
pub fn knn_search(
    conn: &Connection,
    query: &[f32],
    min_similarity: f32,
    limit: usize,
) -> Result<Vec<(Candidate, f32)>> {
    let mut stmt = conn
        .prepare(
            "SELECT doc_id, title, abstract_text, embedding_json, graph_embedding_json
             FROM documents WHERE embedding_json IS NOT NULL",
        )
        .context("prepare embedding scan")?;
    let rows = stmt.query_map([], read_row).context("scan embeddings")?;

    let mut scored = Vec::new();
    for row in rows {
        let candidate = row.context("read embedding row")?.into_candidate()?;
        let Some(embedding) = candidate.embedding.as_deref() else {
            continue;
        };
        let similarity = unit_similarity(query, embedding);
        if similarity >= min_similarity {
            scored.push((candidate, similarity));
        }
    }

    scored.sort_by(|(left, left_sim), (right, right_sim)| {
        right_sim
            .partial_cmp(left_sim)
            .unwrap_or(Ordering::Equal)
            .then_with(|| left.id.cmp(&right.id))
    });
    scored.truncate(limit);
    Ok(scored)
}

/// Graph embedding stored for `doc_id`, if any.
///
/// # Errors
///
/// Returns an error if the lookup fails or the stored value is corrupt.
pub fn graph_embedding(conn: &Connection, doc_id: &str) -> Result<Option<Vec<f32>>> {
    let raw: Option<Option<String>> = conn
        .query_row(
            "SELECT graph_embedding_json FROM documents WHERE doc_id = ?1",
            [doc_id],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("look up graph embedding of {doc_id}"))?;

    decode_vector(raw.flatten().as_deref())
}
