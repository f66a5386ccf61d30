//! Document store schema.
//!
//! - `documents` holds one row per document with its embeddings as JSON arrays
//! - `documents_fts` mirrors title and abstract for BM25 ranking
//! - `store_meta` tracks the schema version and last index time

/// Migration v1: documents table and store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    doc_id TEXT PRIMARY KEY CHECK (length(trim(doc_id)) > 0),
    title TEXT NOT NULL,
    abstract_text TEXT NOT NULL DEFAULT '',
    embedding_json TEXT,
    graph_embedding_json TEXT,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    last_indexed_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version, last_indexed_at_us)
VALUES (1, 1, 0);
";

/// Migration v2: FTS5 index with sync triggers.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_documents_updated
    ON documents(updated_at_us DESC);

CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
    title,
    abstract_text,
    doc_id UNINDEXED,
    tokenize='porter unicode61',
    prefix='2 3'
);

CREATE TRIGGER IF NOT EXISTS documents_ai
AFTER INSERT ON documents
BEGIN
    INSERT INTO documents_fts(rowid, title, abstract_text, doc_id)
    VALUES (new.rowid, new.title, new.abstract_text, new.doc_id);
END;

CREATE TRIGGER IF NOT EXISTS documents_au
AFTER UPDATE ON documents
BEGIN
    INSERT INTO documents_fts(documents_fts, rowid, title, abstract_text, doc_id)
    VALUES ('delete', old.rowid, old.title, old.abstract_text, old.doc_id);

    INSERT INTO documents_fts(rowid, title, abstract_text, doc_id)
    VALUES (new.rowid, new.title, new.abstract_text, new.doc_id);
END;

CREATE TRIGGER IF NOT EXISTS documents_ad
AFTER DELETE ON documents
BEGIN
    INSERT INTO documents_fts(documents_fts, rowid, title, abstract_text, doc_id)
    VALUES ('delete', old.rowid, old.title, old.abstract_text, old.doc_id);
END;

DELETE FROM documents_fts;
INSERT INTO documents_fts(rowid, title, abstract_text, doc_id)
SELECT rowid, title, abstract_text, doc_id FROM documents;
";
