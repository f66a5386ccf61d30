use crate::model::profile::ADAPTIVE_PROFILE;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// How the weight profile for a request is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProfileSelector {
    /// A registered profile, looked up by exact name.
    Named(String),
    /// Ask the adaptive weighting policy for this query's context.
    Adaptive,
}

impl ProfileSelector {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl FromStr for ProfileSelector {
    type Err = Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case(ADAPTIVE_PROFILE) {
            Ok(Self::Adaptive)
        } else {
            Ok(Self::Named(trimmed.to_string()))
        }
    }
}

impl From<String> for ProfileSelector {
    fn from(raw: String) -> Self {
        match raw.parse() {
            Ok(selector) => selector,
            Err(never) => match never {},
        }
    }
}

impl From<ProfileSelector> for String {
    fn from(selector: ProfileSelector) -> Self {
        selector.to_string()
    }
}

impl fmt::Display for ProfileSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Adaptive => f.write_str(ADAPTIVE_PROFILE),
        }
    }
}

/// A ranking request as received from a caller.
///
/// Unset fields take their defaults from configuration when the request is
/// resolved into a [`Query`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub profile: Option<ProfileSelector>,
    #[serde(default)]
    pub semantic_threshold: Option<f32>,
    #[serde(default)]
    pub expand_query: bool,
    /// `false` returns lexical candidates only, skipping every other stage.
    #[serde(default = "default_true")]
    pub full_pipeline: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: None,
            profile: None,
            semantic_threshold: None,
            expand_query: false,
            full_pipeline: true,
        }
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_profile(mut self, profile: ProfileSelector) -> Self {
        self.profile = Some(profile);
        self
    }

    #[must_use]
    pub const fn with_semantic_threshold(mut self, threshold: f32) -> Self {
        self.semantic_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub const fn with_expansion(mut self, enabled: bool) -> Self {
        self.expand_query = enabled;
        self
    }

    #[must_use]
    pub const fn lexical_only(mut self) -> Self {
        self.full_pipeline = false;
        self
    }
}

/// Request options after defaults are applied and validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    pub limit: usize,
    pub semantic_threshold: Option<f32>,
    pub profile: ProfileSelector,
    pub expand: bool,
    pub full_pipeline: bool,
}

/// A validated query. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub raw: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded: Option<String>,
    pub options: QueryOptions,
}

impl Query {
    /// Text sent to retrieval: the expansion when present, else the raw query.
    #[must_use]
    pub fn text(&self) -> &str {
        self.expanded.as_deref().unwrap_or(&self.raw)
    }
}

const fn default_true() -> bool {
    true
}
