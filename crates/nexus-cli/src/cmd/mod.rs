pub mod feedback;
pub mod index;
pub mod profiles;
pub mod search;

use anyhow::{Context, Result};
use nexus_core::config::{NEXUS_DIR, NexusConfig, load_project_config};
use nexus_core::db::STORE_FILE;
use nexus_feedback::ThompsonProfileStore;
use std::path::{Path, PathBuf};

/// Path of the document store under `project_root`.
pub fn store_path(project_root: &Path) -> PathBuf {
    project_root.join(NEXUS_DIR).join(STORE_FILE)
}

/// Load and validate `.nexus/config.toml`.
pub fn load_config(project_root: &Path) -> Result<NexusConfig> {
    let config = load_project_config(project_root)?;
    config.validate()?;
    Ok(config)
}

/// The adaptive profile store persisted next to the document store.
pub fn open_adaptive_store(
    project_root: &Path,
    config: &NexusConfig,
) -> Result<ThompsonProfileStore> {
    let registry = config.registry()?;
    let base = registry.get(&config.search.default_profile)?.clone();
    ThompsonProfileStore::open(&project_root.join(NEXUS_DIR), base, config.feedback.seed)
        .context("open adaptive profile store")
}
