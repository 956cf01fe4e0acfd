//! Dependency validation outcome types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a dependency was not (cleanly) satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueReason {
    /// No file exists at the declared path
    NotFound,
    /// The file exists but is older than the policy allows
    TooOld,
    /// The dependency is not produced by the current workflow
    WorkflowViolation,
}

impl IssueReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueReason::NotFound => "NOT_FOUND",
            IssueReason::TooOld => "TOO_OLD",
            IssueReason::WorkflowViolation => "WORKFLOW_VIOLATION",
        }
    }
}

impl std::fmt::Display for IssueReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a resolved dependency is satisfied from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencySource {
    /// Produced by an earlier step of the same workflow
    Workflow,
    /// Read from the shared filesystem/database
    Database,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDependency {
    pub source: DependencySource,
}

/// One unmet or degraded dependency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyIssue {
    pub name: String,
    pub reason: IssueReason,
    /// The dependency is required by its policy. Blocking is decided by
    /// whether the issue lands in `errors` or `warnings`.
    pub required: bool,
    pub message: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl DependencyIssue {
    pub fn new(
        name: impl Into<String>,
        reason: IssueReason,
        required: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            reason,
            required,
            message: message.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Aggregate outcome of validating one module's declared dependencies.
///
/// Errors block execution; warnings never do.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyValidationResult {
    pub resolved: BTreeMap<String, ResolvedDependency>,
    pub errors: Vec<DependencyIssue>,
    pub warnings: Vec<DependencyIssue>,
}

impl DependencyValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn should_block(&self) -> bool {
        !self.is_valid()
    }

    pub fn resolve(&mut self, name: &str, source: DependencySource) {
        self.resolved
            .insert(name.to_string(), ResolvedDependency { source });
    }

    pub fn source_of(&self, name: &str) -> Option<DependencySource> {
        self.resolved.get(name).map(|r| r.source)
    }

    /// Record an issue as an error or a warning
    pub fn push(&mut self, issue: DependencyIssue, blocking: bool) {
        if blocking {
            self.errors.push(issue);
        } else {
            self.warnings.push(issue);
        }
    }

    /// One-line digest of the blocking issues
    pub fn summary(&self) -> String {
        if self.errors.is_empty() {
            return "all dependencies satisfied".to_string();
        }
        self.errors
            .iter()
            .map(|e| format!("{} ({})", e.name, e.reason))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
