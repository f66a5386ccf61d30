use serde::{Deserialize, Serialize};

const GENERAL_CONTEXT: &str = "general";

/// What the adaptive weighting policy knows about a query.
///
/// Inferred from the domain-keyword lookup; carried on the response so the
/// caller can report an outcome against the same context later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl QueryContext {
    pub fn for_domain(domain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
        }
    }

    /// Stable key used to bucket learned statistics.
    #[must_use]
    pub fn key(&self) -> String {
        self.domain
            .as_deref()
            .map(|domain| domain.trim().to_lowercase())
            .filter(|domain| !domain.is_empty())
            .unwrap_or_else(|| GENERAL_CONTEXT.to_string())
    }
}
