//! Capability adapter over the SQLite document store.
//!
//! rusqlite calls are blocking, so each one runs on the blocking thread pool
//! behind a shared connection lock.

use crate::capability::{GraphEmbeddings, LexicalHit, LexicalSearch, VectorHit, VectorSearch};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use nexus_core::db::{embeddings, fts};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    #[must_use]
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Open (or create) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(nexus_core::db::open_store(path)?))
    }

    /// Run `f` with the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|err| anyhow!("store task failed: {err}"))?
    }
}

#[async_trait]
impl LexicalSearch for SqliteStore {
    async fn search(&self, text: &str, limit: usize) -> Result<Vec<LexicalHit>> {
        let text = text.to_string();
        let hits = self
            .with_conn(move |conn| fts::search_bm25(conn, &text, limit))
            .await
            .context("lexical search failed")?;

        Ok(hits
            .into_iter()
            .map(|hit| LexicalHit {
                candidate: hit.document,
                score: hit.score,
            })
            .collect())
    }
}

#[async_trait]
impl VectorSearch for SqliteStore {
    async fn search(
        &self,
        embedding: &[f32],
        min_similarity: f32,
        limit: usize,
    ) -> Result<Vec<VectorHit>> {
        let embedding = embedding.to_vec();
        let hits = self
            .with_conn(move |conn| embeddings::knn_search(conn, &embedding, min_similarity, limit))
            .await
            .context("vector search failed")?;

        Ok(hits
            .into_iter()
            .map(|(candidate, similarity)| VectorHit {
                candidate,
                similarity,
            })
            .collect())
    }
}

#[async_trait]
impl GraphEmbeddings for SqliteStore {
    async fn embedding_for(&self, candidate_id: &str) -> Result<Option<Vec<f32>>> {
        let candidate_id = candidate_id.to_string();
        self.with_conn(move |conn| embeddings::graph_embedding(conn, &candidate_id))
            .await
    }
}
