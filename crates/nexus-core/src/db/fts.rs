//! FTS5 full-text search with BM25 ranking.
//!
//! Queries are rewritten into an OR of quoted prefix terms built from
//! [`crate::text::term_key`], so "cryptography" reaches "cryptographic"
//! through the porter-stemmed index.
//!
//! # Column Weights (BM25)
//!
//! | Column        | Weight |
//! |---------------|--------|
//! | title         | 3.0    |
//! | abstract_text | 1.0    |

use crate::db::documents::{StoredDocument, read_row};
use crate::model::Candidate;
use crate::text;
use anyhow::{Context, Result};
use rusqlite::{Connection, params};

pub const BM25_WEIGHT_TITLE: f64 = 3.0;
pub const BM25_WEIGHT_ABSTRACT: f64 = 1.0;

/// A lexical hit with its relevance scaled to `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub document: Candidate,
    /// Raw BM25 rank (lower is better).
    pub rank: f64,
    /// Relevance relative to the best hit of the same query.
    pub score: f32,
}

/// Build an FTS5 MATCH expression from free text.
///
/// Returns `None` when the text has no searchable terms.
#[must_use]
pub fn build_match_query(query: &str) -> Option<String> {
    let mut keys: Vec<String> = text::unique_terms(query)
        .iter()
        .map(|term| text::term_key(term))
        .collect();
    keys.dedup();
    if keys.is_empty() {
        return None;
    }

    let clauses: Vec<String> = keys
        .iter()
        .map(|key| format!("\"{}\"*", key.replace('"', "")))
        .collect();
    Some(clauses.join(" OR "))
}

/// Search title and abstract with BM25 ranking.
///
/// # Errors
///
/// Returns an error if the FTS5 query fails or a stored row is corrupt.
pub fn search_bm25(conn: &Connection, query: &str, limit: usize) -> Result<Vec<LexicalHit>> {
    let Some(match_query) = build_match_query(query) else {
        return Ok(Vec::new());
    };
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let sql = "SELECT d.doc_id, d.title, d.abstract_text, d.embedding_json, \
                      d.graph_embedding_json, bm25(documents_fts, ?1, ?2) AS rank \
               FROM documents_fts f \
               INNER JOIN documents d ON d.doc_id = f.doc_id \
               WHERE documents_fts MATCH ?3 \
               ORDER BY rank, d.doc_id \
               LIMIT ?4";

    let mut stmt = conn.prepare(sql).context("prepare FTS5 BM25 search query")?;
    let rows = stmt
        .query_map(
            params![BM25_WEIGHT_TITLE, BM25_WEIGHT_ABSTRACT, match_query, limit],
            |row| Ok((read_row(row)?, row.get::<_, f64>(5)?)),
        )
        .with_context(|| format!("execute FTS5 search for '{query}'"))?;

    let mut raw: Vec<(StoredDocument, f64)> = Vec::new();
    for row in rows {
        raw.push(row.context("read FTS5 search hit")?);
    }

    let best = raw
        .iter()
        .map(|(_, rank)| -rank)
        .fold(0.0_f64, f64::max);

    raw.into_iter()
        .map(|(stored, rank)| {
            let score = if best > 0.0 {
                ((-rank) / best).clamp(0.0, 1.0)
            } else {
                1.0
            };
            #[allow(clippy::cast_possible_truncation)]
            let score = score as f32;
            Ok(LexicalHit {
                document: stored.into_candidate()?,
                rank,
                score,
            })
        })
        .collect()
}

/// Number of rows in the FTS5 index.
///
/// # Errors
///
/// Returns an error if the count query fails.
pub fn fts_row_count(conn: &Connection) -> Result<u64> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM documents_fts", [], |row| row.get(0))
        .context("count FTS5 rows")?;
    Ok(u64::try_from(count).unwrap_or(0))
}
