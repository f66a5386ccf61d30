//! `nx index` loads documents into the project store.

use crate::cmd::store_path;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::Context;
use clap::Args;
use nexus_core::db::{self, documents};
use nexus_core::model::Candidate;
use nexus_search::backend::HashingEmbedder;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug)]
#[command(
    about = "Index documents into the project store",
    long_about = "Read a JSON array of documents ({id, title, abstract}) and upsert them into \
                  .nexus/documents.sqlite3. Documents without an embedding get an offline \
                  feature-hashing embedding.",
    after_help = "EXAMPLES:\n    # Index a document file\n    nx index patents.json\n\n\
                  # Emit machine-readable output\n    nx index patents.json --json"
)]
pub struct IndexArgs {
    /// JSON file holding an array of documents.
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct IndexOutput {
    pub store: String,
    pub indexed: usize,
    pub embedded: usize,
    pub total: u64,
}

/// Execute `nx index <file>`.
///
/// # Errors
///
/// Returns an error if the file cannot be parsed or the store cannot be written.
pub fn run_index(args: &IndexArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let mut docs: Vec<Candidate> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", args.file.display()))?;

    let embedder = HashingEmbedder::default();
    let mut embedded = 0;
    for doc in &mut docs {
        if doc.embedding.is_none() {
            doc.embedding = Some(embedder.embed_text(&doc.embedding_text()));
            embedded += 1;
        }
    }

    let path = store_path(project_root);
    let mut conn = db::open_store(&path)?;
    let tx = conn.transaction().context("begin index transaction")?;
    for doc in &docs {
        documents::upsert_document(&tx, doc)?;
    }
    tx.commit().context("commit index transaction")?;
    let total = documents::count_documents(&conn)?;
    info!(indexed = docs.len(), embedded, total, "indexed documents");

    let summary = IndexOutput {
        store: path.display().to_string(),
        indexed: docs.len(),
        embedded,
        total,
    };
    render_mode(output, &summary, render_index_text, render_index_pretty)
}

fn render_index_text(summary: &IndexOutput, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "indexed\t{}\ttotal\t{}", summary.indexed, summary.total)
}

fn render_index_pretty(summary: &IndexOutput, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "Index")?;
    pretty_kv(w, "store", &summary.store)?;
    pretty_kv(w, "indexed", summary.indexed.to_string())?;
    pretty_kv(w, "embedded", summary.embedded.to_string())?;
    pretty_kv(w, "total", summary.total.to_string())
}
