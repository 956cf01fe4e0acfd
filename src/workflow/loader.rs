//! Workflow directory loader
//!
//! Discover workflow JSON files in a directory and validate their structure.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, error};

use super::WorkflowDefinition;
use crate::dependency::{DependencyPolicyFactory, PolicySpec};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error in {file}: {error}")]
    Json {
        file: String,
        error: serde_json::Error,
    },

    #[error("YAML parse error in {file}: {error}")]
    Yaml {
        file: String,
        error: serde_yaml::Error,
    },

    #[error("Invalid workflow {file}: {}", .problems.join("; "))]
    Invalid { file: String, problems: Vec<String> },
}

/// Outcome of scanning a workflow directory
#[derive(Debug, Default)]
pub struct Discovery {
    /// Valid workflows keyed by name
    pub workflows: BTreeMap<String, WorkflowDefinition>,
    /// Files that held valid JSON but failed validation
    pub problems: Vec<String>,
    /// Files skipped because they were not valid JSON
    pub skipped: Vec<PathBuf>,
}

pub struct WorkflowLoader;

impl WorkflowLoader {
    /// Scan the top level of `dir` for `*.json` workflow files.
    ///
    /// Invalid JSON is logged and skipped; structural problems are collected
    /// (every problem in every file) for the caller to report.
    pub fn discover(dir: &Path) -> Result<Discovery, LoadError> {
        let entries = std::fs::read_dir(dir)?.map(|entry| entry.map(|e| e.path()));
        let paths = Self::json_files(entries);

        let mut discovery = Discovery::default();
        let mut sources: BTreeMap<String, PathBuf> = BTreeMap::new();

        for path in paths {
            let raw = match Self::read_json(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    error!("Skipping workflow file: {}", e);
                    discovery.skipped.push(path);
                    continue;
                }
            };

            let definition = match Self::build(&path, raw) {
                Ok(definition) => definition,
                Err(problems) => {
                    discovery.problems.extend(
                        problems
                            .into_iter()
                            .map(|p| format!("{}: {}", path.display(), p)),
                    );
                    continue;
                }
            };

            let name = definition.workflow_name.clone();
            if let Some(first) = sources.get(&name) {
                discovery.problems.push(format!(
                    "{}: duplicate workflow name '{}' (already defined in {})",
                    path.display(),
                    name,
                    first.display()
                ));
                continue;
            }

            debug!("Discovered workflow {} in {}", name, path.display());
            sources.insert(name.clone(), path);
            discovery.workflows.insert(name, definition);
        }

        Ok(discovery)
    }

    /// Sorted `*.json` regular files. Entries that fail to read are logged
    /// and skipped.
    fn json_files(entries: impl IntoIterator<Item = std::io::Result<PathBuf>>) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = entries
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    error!("Skipping unreadable directory entry: {}", e);
                    None
                }
            })
            .filter(|path| {
                path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json")
            })
            .collect();
        paths.sort();
        paths
    }

    /// Load and validate a single workflow file
    pub fn load_file(path: &Path) -> Result<WorkflowDefinition, LoadError> {
        let raw = Self::read_json(path)?;
        Self::build(path, raw).map_err(|problems| LoadError::Invalid {
            file: path.display().to_string(),
            problems,
        })
    }

    /// Structural checks on a raw workflow document.
    ///
    /// Returns every problem found, empty when valid.
    pub fn validate(raw: &Value) -> Vec<String> {
        let mut problems = Vec::new();

        let Some(doc) = raw.as_object() else {
            problems.push("workflow must be a JSON object".to_string());
            return problems;
        };

        let modules = match doc.get("modules") {
            None => {
                problems.push("missing 'modules' key".to_string());
                return problems;
            }
            Some(Value::Array(modules)) => modules,
            Some(_) => {
                problems.push("'modules' must be a list".to_string());
                return problems;
            }
        };

        for (index, entry) in modules.iter().enumerate() {
            let Some(step) = entry.as_object() else {
                problems.push(format!("modules[{}] must be an object", index));
                continue;
            };

            match step.get("module") {
                Some(Value::String(_)) => {}
                Some(_) => problems.push(format!("modules[{}].module must be a string", index)),
                None => problems.push(format!("modules[{}] is missing the 'module' key", index)),
            }

            let Some(policy) = step.get("dependency_policy") else {
                continue;
            };
            if policy.is_null() {
                continue;
            }
            let spec: PolicySpec = match serde_json::from_value(policy.clone()) {
                Ok(spec) => spec,
                Err(_) => {
                    problems.push(format!(
                        "modules[{}].dependency_policy must be a name or {{name, params}}",
                        index
                    ));
                    continue;
                }
            };
            if let Err(e) = DependencyPolicyFactory::create(&spec) {
                problems.push(format!("modules[{}].dependency_policy: {}", index, e));
            }
        }

        problems
    }

    fn read_json(path: &Path) -> Result<Value, LoadError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| LoadError::Json {
            file: path.display().to_string(),
            error: e,
        })
    }

    fn build(path: &Path, raw: Value) -> Result<WorkflowDefinition, Vec<String>> {
        let problems = Self::validate(&raw);
        if !problems.is_empty() {
            return Err(problems);
        }

        let mut definition: WorkflowDefinition =
            serde_json::from_value(raw).map_err(|e| vec![e.to_string()])?;

        if definition.workflow_name.is_empty() {
            definition.workflow_name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
        }

        Ok(definition)
    }
}
