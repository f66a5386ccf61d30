use crate::error::PipelineError;
use crate::model::{ProfileRegistry, STANDARD_PROFILE, SignalWeights, WeightProfile};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory under a project root that holds config, store, and feedback log.
pub const NEXUS_DIR: &str = ".nexus";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NexusConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub diversity: DiversityConfig,
    #[serde(default)]
    pub expansion: ExpansionConfig,
    /// Extra named weight profiles, on top of `standard` and `enhanced`.
    #[serde(default)]
    pub profiles: BTreeMap<String, SignalWeights>,
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    #[serde(default = "default_profile")]
    pub default_profile: String,
    #[serde(default = "default_request_deadline_ms")]
    pub request_deadline_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            default_profile: default_profile(),
            request_deadline_ms: default_request_deadline_ms(),
        }
    }
}

impl SearchConfig {
    #[must_use]
    pub const fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum candidates taken from each retrieval source.
    #[serde(default = "default_candidate_cap")]
    pub candidate_cap: usize,
    /// Minimum unit-range similarity for vector retrieval.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
    #[serde(default = "default_retrieval_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_cap: default_candidate_cap(),
            min_similarity: default_min_similarity(),
            timeout_ms: default_retrieval_timeout_ms(),
        }
    }
}

impl RetrievalConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Candidates that receive the expensive secondary signals.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Candidates averaged into the pseudo-relevance feedback vector.
    #[serde(default = "default_prf_top_m")]
    pub prf_top_m: usize,
    /// Concurrent external scoring calls per request.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_coherence_timeout_ms")]
    pub coherence_timeout_ms: u64,
    #[serde(default = "default_graph_timeout_ms")]
    pub graph_timeout_ms: u64,
    #[serde(default = "default_coherence_fallback")]
    pub coherence_fallback: f32,
    #[serde(default = "default_provisional_lexical")]
    pub provisional_lexical: f32,
    #[serde(default = "default_provisional_semantic")]
    pub provisional_semantic: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            prf_top_m: default_prf_top_m(),
            workers: default_workers(),
            coherence_timeout_ms: default_coherence_timeout_ms(),
            graph_timeout_ms: default_graph_timeout_ms(),
            coherence_fallback: default_coherence_fallback(),
            provisional_lexical: default_provisional_lexical(),
            provisional_semantic: default_provisional_semantic(),
        }
    }
}

impl ScoringConfig {
    #[must_use]
    pub const fn coherence_timeout(&self) -> Duration {
        Duration::from_millis(self.coherence_timeout_ms)
    }

    #[must_use]
    pub const fn graph_timeout(&self) -> Duration {
        Duration::from_millis(self.graph_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiversityConfig {
    #[serde(default = "default_diversity_coefficient")]
    pub coefficient: f32,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            coefficient: default_diversity_coefficient(),
        }
    }
}

/// Related terms for one domain, in expansion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainKeywords {
    pub name: String,
    pub terms: Vec<String>,
}

impl DomainKeywords {
    pub fn new(name: impl Into<String>, terms: &[&str]) -> Self {
        Self {
            name: name.into(),
            terms: terms.iter().map(|term| (*term).to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionConfig {
    #[serde(default = "default_max_terms")]
    pub max_terms: usize,
    /// Replaces the built-in table when non-empty.
    #[serde(default)]
    pub domains: Vec<DomainKeywords>,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            max_terms: default_max_terms(),
            domains: Vec::new(),
        }
    }
}

impl ExpansionConfig {
    /// The domain table in lookup order.
    #[must_use]
    pub fn domain_table(&self) -> Vec<DomainKeywords> {
        if self.domains.is_empty() {
            builtin_domains()
        } else {
            self.domains.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Learn per-context weights from recorded outcomes.
    #[serde(default)]
    pub adaptive: bool,
    /// Fixed seed for posterior sampling.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl NexusConfig {
    /// Built-in profiles plus the configured ones.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidProfile`] for a reserved name or bad
    /// weights.
    pub fn registry(&self) -> Result<ProfileRegistry, PipelineError> {
        let mut registry = ProfileRegistry::default();
        for (name, weights) in &self.profiles {
            registry.insert(WeightProfile::new(name.clone(), *weights))?;
        }
        Ok(registry)
    }

    /// Check cross-field constraints that serde defaults cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.search.max_limit == 0 {
            return Err(PipelineError::Config("search.max_limit must be at least 1".into()));
        }
        if self.search.default_limit == 0 || self.search.default_limit > self.search.max_limit {
            return Err(PipelineError::Config(format!(
                "search.default_limit must be between 1 and {}",
                self.search.max_limit
            )));
        }
        if !(0.0..=1.0).contains(&self.retrieval.min_similarity) {
            return Err(PipelineError::Config(
                "retrieval.min_similarity must be within [0, 1]".into(),
            ));
        }
        if self.scoring.workers == 0 {
            return Err(PipelineError::Config("scoring.workers must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.scoring.coherence_fallback) {
            return Err(PipelineError::Config(
                "scoring.coherence_fallback must be within [0, 1]".into(),
            ));
        }
        if !self.diversity.coefficient.is_finite() || self.diversity.coefficient < 0.0 {
            return Err(PipelineError::Config(
                "diversity.coefficient must be finite and non-negative".into(),
            ));
        }
        let registry = self.registry()?;
        if !registry.contains(&self.search.default_profile) {
            return Err(PipelineError::UnknownProfile(self.search.default_profile.clone()));
        }
        Ok(())
    }
}

/// Path of the project config file under `project_root`.
#[must_use]
pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(NEXUS_DIR).join("config.toml")
}

/// Load `.nexus/config.toml` under `project_root`; a missing file yields defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<NexusConfig> {
    let path = config_path(project_root);
    if !path.exists() {
        return Ok(NexusConfig::default());
    }
    load_config(&path)
}

/// Load a config file from an explicit path.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<NexusConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<NexusConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Domain table used when configuration supplies none.
#[must_use]
pub fn builtin_domains() -> Vec<DomainKeywords> {
    vec![
        DomainKeywords::new(
            "Cryptography",
            &["encryption", "cryptographic", "zero-knowledge", "cipher", "signature", "hash"],
        ),
        DomainKeywords::new(
            "Blockchain",
            &["distributed ledger", "cryptographic", "consensus", "immutable", "smart contract"],
        ),
        DomainKeywords::new(
            "Machine Learning",
            &["neural network", "deep learning", "training", "model", "classification"],
        ),
        DomainKeywords::new(
            "Computer Vision",
            &["image recognition", "convolutional", "object detection", "segmentation", "camera"],
        ),
        DomainKeywords::new(
            "Natural Language Processing",
            &["language model", "transfer learning", "text", "tokenization", "semantic"],
        ),
        DomainKeywords::new(
            "Quantum Computing",
            &["qubit", "superposition", "entanglement", "quantum", "molecular simulation"],
        ),
        DomainKeywords::new(
            "Autonomous Vehicles",
            &["navigation", "sensor fusion", "lidar", "perception", "self-driving"],
        ),
        DomainKeywords::new(
            "Reinforcement Learning",
            &["reward", "policy", "agent", "decision-making", "optimization"],
        ),
        DomainKeywords::new(
            "Neural Interface",
            &["brain-computer", "neural activity", "non-invasive", "neurotechnology", "signals"],
        ),
        DomainKeywords::new(
            "Pharmaceutical",
            &["drug discovery", "molecular", "compound", "clinical", "biotech"],
        ),
        DomainKeywords::new(
            "Privacy",
            &["identity", "zero-knowledge", "personal data", "anonymization", "credentials"],
        ),
    ]
}

const fn default_limit() -> usize {
    10
}

const fn default_max_limit() -> usize {
    100
}

fn default_profile() -> String {
    STANDARD_PROFILE.to_string()
}

const fn default_request_deadline_ms() -> u64 {
    10_000
}

const fn default_candidate_cap() -> usize {
    100
}

const fn default_min_similarity() -> f32 {
    0.5
}

const fn default_retrieval_timeout_ms() -> u64 {
    3_000
}

const fn default_top_k() -> usize {
    20
}

const fn default_prf_top_m() -> usize {
    5
}

const fn default_workers() -> usize {
    4
}

const fn default_coherence_timeout_ms() -> u64 {
    2_000
}

const fn default_graph_timeout_ms() -> u64 {
    500
}

const fn default_coherence_fallback() -> f32 {
    0.5
}

const fn default_provisional_lexical() -> f32 {
    0.4
}

const fn default_provisional_semantic() -> f32 {
    0.6
}

const fn default_diversity_coefficient() -> f32 {
    0.2
}

const fn default_max_terms() -> usize {
    5
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let config = load_project_config(dir.path()).expect("load");
        assert_eq!(config, NexusConfig::default());
        assert_eq!(config.search.default_limit, 10);
        assert_eq!(config.scoring.top_k, 20);
        assert_eq!(config.scoring.workers, 4);
        assert!((config.diversity.coefficient - 0.2).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::create_dir_all(dir.path().join(NEXUS_DIR)).expect("mkdir");
        std::fs::write(
            config_path(dir.path()),
            r#"
[search]
default_profile = "recall"

[scoring]
workers = 8

[profiles.recall]
lexical = 0.5
semantic = 0.5
coherence = 0.0
graph = 0.0
feedback = 0.0
historical_feedback = 0.0
"#,
        )
        .expect("write config");

        let config = load_project_config(dir.path()).expect("load");
        assert_eq!(config.scoring.workers, 8);
        assert_eq!(config.scoring.top_k, 20);
        assert_eq!(config.search.max_limit, 100);
        config.validate().expect("valid config");

        let registry = config.registry().expect("registry");
        assert!(registry.contains("recall"));
        assert!(registry.contains("standard"));
    }

    #[test]
    fn parse_failure_names_the_file() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::create_dir_all(dir.path().join(NEXUS_DIR)).expect("mkdir");
        std::fs::write(config_path(dir.path()), "[search\n").expect("write");

        let err = load_project_config(dir.path()).expect_err("parse error");
        assert!(format!("{err:#}").contains("config.toml"));
    }

    #[test]
    fn default_profile_must_exist() {
        let mut config = NexusConfig::default();
        config.search.default_profile = "turbo".into();
        assert!(matches!(
            config.validate(),
            Err(PipelineError::UnknownProfile(name)) if name == "turbo"
        ));
    }

    #[test]
    fn custom_profile_cannot_shadow_adaptive() {
        let mut config = NexusConfig::default();
        config
            .profiles
            .insert("adaptive".into(), SignalWeights::default());
        assert!(matches!(
            config.registry(),
            Err(PipelineError::InvalidProfile { .. })
        ));
    }

    #[test]
    fn configured_domains_replace_builtin_table() {
        let mut expansion = ExpansionConfig::default();
        assert!(expansion.domain_table().iter().any(|d| d.name == "Cryptography"));

        expansion.domains = vec![DomainKeywords::new("Robotics", &["actuator", "gripper"])];
        let table = expansion.domain_table();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].terms, ["actuator", "gripper"]);
    }
}
