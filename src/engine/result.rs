//! Execution result types

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::dependency::DependencyValidationResult;
use crate::module::ModuleResult;

/// Insertion-ordered name -> value map.
///
/// Re-inserting a name replaces its value in place, keeping the original
/// position.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedResults<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for OrderedResults<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> OrderedResults<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: T) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl<T: Serialize> Serialize for OrderedResults<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Success,
    Failed,
}

/// Outcome of one module step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleResultView {
    #[serde(flatten)]
    pub result: ModuleResult,
    pub required: bool,
    /// Served from the executor's cache instead of being executed
    pub cached: bool,
    pub policy: &'static str,
    pub dependencies: DependencyValidationResult,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionSummary {
    /// Modules served from cache during this call
    pub cached_modules: Vec<String>,
    /// Declared step count, including steps never reached
    pub total_modules: usize,
}

/// Result of a workflow execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowExecutorResult {
    pub workflow_name: String,
    pub execution_id: String,
    pub status: WorkflowStatus,
    pub results: OrderedResults<ModuleResultView>,
    pub execution_context: ExecutionSummary,
}

impl WorkflowExecutorResult {
    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Success
    }

    pub fn get(&self, module: &str) -> Option<&ModuleResultView> {
        self.results.get(module)
    }
}

/// Results of a workflow chain, in execution order
pub type ChainResult = OrderedResults<WorkflowExecutorResult>;

impl OrderedResults<WorkflowExecutorResult> {
    /// True when every workflow that ran succeeded
    pub fn is_success(&self) -> bool {
        self.entries.iter().all(|(_, r)| r.is_success())
    }
}
