//! Workflow and module step definitions

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::dependency::PolicySpec;

/// A complete workflow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow name; falls back to the file stem when loaded from disk
    #[serde(default)]
    pub workflow_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Steps, executed in declared order
    pub modules: Vec<ModuleStep>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>, modules: Vec<ModuleStep>) -> Self {
        Self {
            workflow_name: name.into(),
            description: None,
            modules,
        }
    }

    /// Module names in declared order (duplicates kept)
    pub fn module_names(&self) -> Vec<String> {
        self.modules.iter().map(|m| m.module.clone()).collect()
    }
}

/// One module invocation within a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleStep {
    pub module: String,

    /// Overrides the registry's config path for this module
    #[serde(default)]
    pub config_file: Option<PathBuf>,

    /// Strict when omitted
    #[serde(default)]
    pub dependency_policy: Option<PolicySpec>,

    /// A failing required step halts the workflow
    #[serde(default)]
    pub required: bool,
}

impl ModuleStep {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            config_file: None,
            dependency_policy: None,
            required: false,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn policy(mut self, spec: impl Into<PolicySpec>) -> Self {
        self.dependency_policy = Some(spec.into());
        self
    }

    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }
}

