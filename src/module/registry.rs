//! Module registry
//!
//! Maps module names to constructors. Two sources are merged:
//! - the constructors registered in code (`register`)
//! - an external declarative registry file (YAML or JSON) with per-module
//!   `config_path`, `enabled`, `description` and free-form metadata
//!
//! ```yaml
//! DataPipelineOrchestrator:
//!   config_path: configs/data_pipeline.yaml
//!   enabled: true
//!   description: Collects and cleans raw production records
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::traits::Module;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Module not found in registry: {0}")]
    UnknownModule(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error in {file}: {error}")]
    Yaml {
        file: String,
        error: serde_yaml::Error,
    },

    #[error("JSON parse error in {file}: {error}")]
    Json {
        file: String,
        error: serde_json::Error,
    },
}

/// Builds a module given its (optional) config path
pub type ModuleConstructor = Arc<dyn Fn(Option<PathBuf>) -> Box<dyn Module> + Send + Sync>;

/// One entry of the external registry file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    #[serde(default)]
    pub config_path: Option<PathBuf>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub description: Option<String>,

    /// Any other keys, kept verbatim
    #[serde(flatten)]
    pub metadata: BTreeMap<String, Value>,
}

fn default_enabled() -> bool {
    true
}

impl Default for RegistryEntry {
    fn default() -> Self {
        Self {
            config_path: None,
            enabled: default_enabled(),
            description: None,
            metadata: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct ModuleRegistry {
    constructors: HashMap<String, ModuleConstructor>,
    entries: HashMap<String, RegistryEntry>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.list_modules(false))
            .field("entries", &self.entries)
            .finish()
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `name`
    pub fn register<F>(mut self, name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(Option<PathBuf>) -> Box<dyn Module> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Arc::new(constructor));
        self
    }

    /// Merge external registry entries
    pub fn with_entries(mut self, entries: HashMap<String, RegistryEntry>) -> Self {
        self.entries.extend(entries);
        self
    }

    /// Merge external registry entries read from a YAML or JSON file
    pub fn with_registry_file(self, path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let entries = Self::load_entries(path)?;
        Ok(self.with_entries(entries))
    }

    /// Read an external registry file; `.json` is parsed as JSON, anything else as YAML
    pub fn load_entries(
        path: impl AsRef<Path>,
    ) -> Result<HashMap<String, RegistryEntry>, RegistryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let entries: HashMap<String, RegistryEntry> = if is_json {
            serde_json::from_str(&content).map_err(|e| RegistryError::Json {
                file: path.display().to_string(),
                error: e,
            })?
        } else {
            serde_yaml::from_str::<Option<HashMap<String, RegistryEntry>>>(&content)
                .map_err(|e| RegistryError::Yaml {
                    file: path.display().to_string(),
                    error: e,
                })?
                .unwrap_or_default()
        };

        debug!("Loaded {} registry entries from {}", entries.len(), path.display());
        Ok(entries)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Construct a module.
    ///
    /// Config path priority: `override_config`, then the registry entry's
    /// `config_path`, then none.
    pub fn get_module_instance(
        &self,
        name: &str,
        override_config: Option<&Path>,
    ) -> Result<Box<dyn Module>, RegistryError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| RegistryError::UnknownModule(name.to_string()))?;

        let config_path = override_config
            .map(Path::to_path_buf)
            .or_else(|| self.entries.get(name).and_then(|e| e.config_path.clone()));

        debug!("Instantiating module {} (config: {:?})", name, config_path);
        Ok(constructor(config_path))
    }

    /// Compiled-in module names, sorted.
    ///
    /// With `enabled_only`, names without a registry entry are excluded.
    pub fn list_modules(&self, enabled_only: bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .constructors
            .keys()
            .filter(|name| {
                !enabled_only || self.entries.get(*name).map(|e| e.enabled).unwrap_or(false)
            })
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// The external registry entry for `name`, or an empty one if absent
    pub fn get_module_info(&self, name: &str) -> Result<RegistryEntry, RegistryError> {
        if !self.contains(name) {
            return Err(RegistryError::UnknownModule(name.to_string()));
        }
        Ok(self.entries.get(name).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_yaml_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.yaml");
        fs::write(
            &path,
            r#"
ValidationOrchestrator:
  config_path: configs/validation.yaml
  enabled: false
  description: Cross-checks production records
  owner: quality
AnalyticsOrchestrator: {}
"#,
        )
        .unwrap();

        let entries = ModuleRegistry::load_entries(&path).unwrap();
        assert_eq!(entries.len(), 2);

        let validation = &entries["ValidationOrchestrator"];
        assert!(!validation.enabled);
        assert_eq!(
            validation.config_path.as_deref(),
            Some(Path::new("configs/validation.yaml"))
        );
        assert_eq!(validation.metadata["owner"], "quality");

        let analytics = &entries["AnalyticsOrchestrator"];
        assert!(analytics.enabled);
        assert!(analytics.config_path.is_none());
    }

    #[test]
    fn test_parse_json_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, r#"{"M1": {"config_path": "m1.yaml"}}"#).unwrap();

        let entries = ModuleRegistry::load_entries(&path).unwrap();
        assert_eq!(
            entries["M1"].config_path.as_deref(),
            Some(Path::new("m1.yaml"))
        );
    }

    #[test]
    fn test_empty_yaml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.yaml");
        fs::write(&path, "").unwrap();

        assert!(ModuleRegistry::load_entries(&path).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_yaml_reports_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.yaml");
        fs::write(&path, "M1: [unterminated").unwrap();

        let err = ModuleRegistry::load_entries(&path).unwrap_err();
        assert!(matches!(err, RegistryError::Yaml { .. }));
        assert!(err.to_string().contains("registry.yaml"));
    }
}
