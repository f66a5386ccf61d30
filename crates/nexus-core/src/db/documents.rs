//! Document rows: insert, update, and lookup.

use crate::model::Candidate;
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Insert a document, or replace title, abstract, and embeddings of an
/// existing one with the same id.
///
/// # Errors
///
/// Returns an error if the embeddings cannot be encoded or the write fails.
pub fn upsert_document(conn: &Connection, document: &Candidate) -> Result<()> {
    let now_us = chrono::Utc::now().timestamp_micros();
    let embedding = encode_vector(document.embedding.as_deref())?;
    let graph_embedding = encode_vector(document.graph_embedding.as_deref())?;

    conn.execute(
        "INSERT INTO documents (
            doc_id, title, abstract_text, embedding_json, graph_embedding_json,
            created_at_us, updated_at_us
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(doc_id) DO UPDATE SET
            title = excluded.title,
            abstract_text = excluded.abstract_text,
            embedding_json = excluded.embedding_json,
            graph_embedding_json = excluded.graph_embedding_json,
            updated_at_us = excluded.updated_at_us",
        params![
            document.id,
            document.title,
            document.abstract_text,
            embedding,
            graph_embedding,
            now_us
        ],
    )
    .with_context(|| format!("upsert document {}", document.id))?;

    conn.execute(
        "UPDATE store_meta SET last_indexed_at_us = ?1 WHERE id = 1",
        [now_us],
    )
    .context("update store metadata")?;
    Ok(())
}

/// Fetch a document by id.
///
/// # Errors
///
/// Returns an error if the query fails or a stored embedding is corrupt.
pub fn get_document(conn: &Connection, doc_id: &str) -> Result<Option<Candidate>> {
    conn.query_row(
        "SELECT doc_id, title, abstract_text, embedding_json, graph_embedding_json
         FROM documents WHERE doc_id = ?1",
        [doc_id],
        read_row,
    )
    .optional()
    .with_context(|| format!("load document {doc_id}"))?
    .map(StoredDocument::into_candidate)
    .transpose()
}

/// Every document, ordered by id.
///
/// # Errors
///
/// Returns an error if the query fails or a stored embedding is corrupt.
pub fn all_documents(conn: &Connection) -> Result<Vec<Candidate>> {
    let mut stmt = conn
        .prepare(
            "SELECT doc_id, title, abstract_text, embedding_json, graph_embedding_json
             FROM documents ORDER BY doc_id",
        )
        .context("prepare document scan")?;
    let rows = stmt.query_map([], read_row).context("scan documents")?;

    let mut documents = Vec::new();
    for row in rows {
        documents.push(row.context("read document row")?.into_candidate()?);
    }
    Ok(documents)
}

/// Number of stored documents.
///
/// # Errors
///
/// Returns an error if the count query fails.
pub fn count_documents(conn: &Connection) -> Result<u64> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
        .context("count documents")?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Raw row as stored; embeddings still JSON-encoded.
pub(crate) struct StoredDocument {
    pub doc_id: String,
    pub title: String,
    pub abstract_text: String,
    pub embedding_json: Option<String>,
    pub graph_embedding_json: Option<String>,
}

impl StoredDocument {
    pub(crate) fn into_candidate(self) -> Result<Candidate> {
        let embedding = decode_vector(self.embedding_json.as_deref())
            .with_context(|| format!("decode embedding of {}", self.doc_id))?;
        let graph_embedding = decode_vector(self.graph_embedding_json.as_deref())
            .with_context(|| format!("decode graph embedding of {}", self.doc_id))?;

        Ok(Candidate {
            id: self.doc_id,
            title: self.title,
            abstract_text: self.abstract_text,
            embedding,
            graph_embedding,
        })
    }
}

pub(crate) fn read_row(row: &Row<'_>) -> rusqlite::Result<StoredDocument> {
    Ok(StoredDocument {
        doc_id: row.get(0)?,
        title: row.get(1)?,
        abstract_text: row.get(2)?,
        embedding_json: row.get(3)?,
        graph_embedding_json: row.get(4)?,
    })
}

pub(crate) fn decode_vector(raw: Option<&str>) -> Result<Option<Vec<f32>>> {
    raw.map(serde_json::from_str::<Vec<f32>>)
        .transpose()
        .context("parse embedding json")
}

fn encode_vector(vector: Option<&[f32]>) -> Result<Option<String>> {
    vector
        .map(serde_json::to_string)
        .transpose()
        .context("encode embedding json")
}
