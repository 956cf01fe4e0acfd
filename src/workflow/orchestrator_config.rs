//! Orchestrator configuration
//!
//! Loaded from `orchestrator.yaml`:
//!
//! ```yaml
//! workflows_dir: workflows
//! module_registry: configs/module_registry.yaml
//! stop_on_failure: true
//!
//! chains:
//!   nightly:
//!     - data_pipeline
//!     - validation
//!     - analytics
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::LoadError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Directory scanned for `*.json` workflow definitions
    #[serde(default = "default_workflows_dir")]
    pub workflows_dir: PathBuf,

    /// External module registry file (YAML or JSON)
    #[serde(default)]
    pub module_registry: Option<PathBuf>,

    /// Stop a named chain at its first failed workflow
    #[serde(default = "default_stop_on_failure")]
    pub stop_on_failure: bool,

    /// Named, ordered workflow chains
    #[serde(default)]
    pub chains: HashMap<String, Vec<String>>,
}

fn default_workflows_dir() -> PathBuf {
    PathBuf::from("workflows")
}

fn default_stop_on_failure() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workflows_dir: default_workflows_dir(),
            module_registry: None,
            stop_on_failure: default_stop_on_failure(),
            chains: HashMap::new(),
        }
    }
}

impl OrchestratorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config: OrchestratorConfig =
            serde_yaml::from_str(&content).map_err(|e| LoadError::Yaml {
                file: path.display().to_string(),
                error: e,
            })?;
        config.resolve_relative_to(path.parent().unwrap_or_else(|| Path::new(".")));
        Ok(config)
    }

    /// Make relative paths relative to the config file's directory
    fn resolve_relative_to(&mut self, base: &Path) {
        if self.workflows_dir.is_relative() {
            self.workflows_dir = base.join(&self.workflows_dir);
        }
        if let Some(registry) = &self.module_registry {
            if registry.is_relative() {
                self.module_registry = Some(base.join(registry));
            }
        }
    }

    pub fn chain(&self, name: &str) -> Option<&[String]> {
        self.chains.get(name).map(Vec::as_slice)
    }
}
