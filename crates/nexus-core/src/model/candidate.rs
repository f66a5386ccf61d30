use serde::{Deserialize, Serialize};

/// A document considered for ranking.
///
/// Sourced from a retrieval backend and read-only inside the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract", alias = "abstract_text")]
    pub abstract_text: String,
    /// Dense text embedding, if one has been computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Embedding of the document's position in the citation graph.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "gnn_embedding"
    )]
    pub graph_embedding: Option<Vec<f32>>,
}

impl Candidate {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        abstract_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            abstract_text: abstract_text.into(),
            embedding: None,
            graph_embedding: None,
        }
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    #[must_use]
    pub fn with_graph_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.graph_embedding = Some(embedding);
        self
    }

    /// Text handed to the coherence judge.
    #[must_use]
    pub fn judge_text(&self) -> String {
        format!("{}. {}", self.title, self.abstract_text)
    }

    /// Text used to compute the document's dense embedding.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        format!("Title: {}\nAbstract: {}", self.title, self.abstract_text)
    }
}
