//! Dependency policies
//!
//! A policy decides whether each of a module's declared dependencies is
//! satisfied, and from where:
//! - `Strict` - only from modules declared in the current workflow
//! - `Flexible` - only from the filesystem, with per-dependency required-ness
//! - `Hybrid` - from the workflow when possible, otherwise the filesystem

use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use super::factory::PolicyError;
use super::issue::{DependencyIssue, DependencySource, DependencyValidationResult, IssueReason};

/// The closed set of policy kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    Strict,
    Flexible,
    Hybrid,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 3] = [PolicyKind::Strict, PolicyKind::Flexible, PolicyKind::Hybrid];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Strict => "strict",
            PolicyKind::Flexible => "flexible",
            PolicyKind::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PolicyKind {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(PolicyKind::Strict),
            "flexible" => Ok(PolicyKind::Flexible),
            "hybrid" => Ok(PolicyKind::Hybrid),
            _ => Err(PolicyError::UnknownPolicy(s.to_string())),
        }
    }
}

/// A constructed dependency policy
#[derive(Debug, Clone, PartialEq)]
pub enum DependencyPolicy {
    Strict(StrictWorkflowPolicy),
    Flexible(FlexibleDependencyPolicy),
    Hybrid(HybridDependencyPolicy),
}

impl Default for DependencyPolicy {
    fn default() -> Self {
        DependencyPolicy::Strict(StrictWorkflowPolicy)
    }
}

impl DependencyPolicy {
    pub fn kind(&self) -> PolicyKind {
        match self {
            DependencyPolicy::Strict(_) => PolicyKind::Strict,
            DependencyPolicy::Flexible(_) => PolicyKind::Flexible,
            DependencyPolicy::Hybrid(_) => PolicyKind::Hybrid,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Validate `dependencies` against the current workflow's module list
    pub fn validate(
        &self,
        dependencies: &BTreeMap<String, String>,
        workflow_modules: &[String],
    ) -> DependencyValidationResult {
        self.validate_at(dependencies, workflow_modules, Utc::now())
    }

    /// Same as [`validate`](Self::validate) with an explicit "now" for age checks
    pub fn validate_at(
        &self,
        dependencies: &BTreeMap<String, String>,
        workflow_modules: &[String],
        now: DateTime<Utc>,
    ) -> DependencyValidationResult {
        match self {
            DependencyPolicy::Strict(p) => p.validate(dependencies, workflow_modules),
            DependencyPolicy::Flexible(p) => p.validate_at(dependencies, now),
            DependencyPolicy::Hybrid(p) => p.validate_at(dependencies, workflow_modules, now),
        }
    }
}

// ============================================================================
// Strict
// ============================================================================

/// Dependencies must be produced by a module of the current workflow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrictWorkflowPolicy;

impl StrictWorkflowPolicy {
    pub fn validate(
        &self,
        dependencies: &BTreeMap<String, String>,
        workflow_modules: &[String],
    ) -> DependencyValidationResult {
        let mut result = DependencyValidationResult::new();

        for name in dependencies.keys() {
            if workflow_modules.iter().any(|m| m == name) {
                result.resolve(name, DependencySource::Workflow);
            } else {
                let issue = DependencyIssue::new(
                    name,
                    IssueReason::WorkflowViolation,
                    true,
                    format!("'{}' is not produced by any module in this workflow", name),
                )
                .with_metadata("workflow_modules", workflow_modules.to_vec());
                result.push(issue, true);
            }
        }

        result
    }
}

// ============================================================================
// Flexible
// ============================================================================

/// Dependencies are read from the filesystem; only `required_deps` block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlexibleDependencyPolicy {
    required_deps: BTreeSet<String>,
    max_age_days: Option<u32>,
}

impl FlexibleDependencyPolicy {
    pub fn new(required_deps: impl IntoIterator<Item = impl Into<String>>, max_age_days: Option<u32>) -> Self {
        Self {
            required_deps: required_deps.into_iter().map(Into::into).collect(),
            max_age_days,
        }
    }

    pub fn from_params(params: &Map<String, Value>) -> Result<Self, PolicyError> {
        let required_deps = match params.get("required_deps") {
            None | Some(Value::Null) => BTreeSet::new(),
            Some(value) => parse_string_set(PolicyKind::Flexible, "required_deps", value)?,
        };
        let max_age_days = parse_max_age(PolicyKind::Flexible, params)?;
        Ok(Self {
            required_deps,
            max_age_days,
        })
    }

    pub fn required_deps(&self) -> &BTreeSet<String> {
        &self.required_deps
    }

    pub fn max_age_days(&self) -> Option<u32> {
        self.max_age_days
    }

    pub fn validate_at(
        &self,
        dependencies: &BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> DependencyValidationResult {
        let mut result = DependencyValidationResult::new();

        for (name, path) in dependencies {
            let required = self.required_deps.contains(name);
            match check_file(path, self.max_age_days, now) {
                Ok(()) => result.resolve(name, DependencySource::Database),
                Err(problem) => result.push(problem.into_issue(name, path, required), required),
            }
        }

        result
    }
}

// ============================================================================
// Hybrid
// ============================================================================

/// Workflow-produced dependencies first, filesystem as a fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridDependencyPolicy {
    max_age_days: Option<u32>,
    prefer_workflow: bool,
}

impl Default for HybridDependencyPolicy {
    fn default() -> Self {
        Self {
            max_age_days: None,
            prefer_workflow: true,
        }
    }
}

impl HybridDependencyPolicy {
    pub fn new(max_age_days: Option<u32>, prefer_workflow: bool) -> Self {
        Self {
            max_age_days,
            prefer_workflow,
        }
    }

    pub fn from_params(params: &Map<String, Value>) -> Result<Self, PolicyError> {
        let max_age_days = parse_max_age(PolicyKind::Hybrid, params)?;
        let prefer_workflow = match params.get("prefer_workflow") {
            None | Some(Value::Null) => true,
            Some(value) => parse_bool(PolicyKind::Hybrid, "prefer_workflow", value)?,
        };
        Ok(Self {
            max_age_days,
            prefer_workflow,
        })
    }

    pub fn max_age_days(&self) -> Option<u32> {
        self.max_age_days
    }

    pub fn prefer_workflow(&self) -> bool {
        self.prefer_workflow
    }

    pub fn validate_at(
        &self,
        dependencies: &BTreeMap<String, String>,
        workflow_modules: &[String],
        now: DateTime<Utc>,
    ) -> DependencyValidationResult {
        let mut result = DependencyValidationResult::new();

        for (name, path) in dependencies {
            // Produced earlier in this run: always fresh, no filesystem check
            if workflow_modules.iter().any(|m| m == name) {
                result.resolve(name, DependencySource::Workflow);
                continue;
            }

            match check_file(path, self.max_age_days, now) {
                Ok(()) => {
                    result.resolve(name, DependencySource::Database);
                    if self.prefer_workflow {
                        let issue = DependencyIssue::new(
                            name,
                            IssueReason::WorkflowViolation,
                            false,
                            format!(
                                "'{}' was resolved from the database; consider adding its producer to the workflow",
                                name
                            ),
                        )
                        .with_metadata("path", path.as_str())
                        .with_metadata("workflow_modules", workflow_modules.to_vec());
                        result.push(issue, false);
                    }
                }
                Err(problem) => result.push(problem.into_issue(name, path, true), true),
            }
        }

        result
    }
}

// ============================================================================
// Filesystem checks
// ============================================================================

enum FileProblem {
    Missing,
    /// Exists or may exist, but cannot be inspected (permissions, not a directory, ...)
    Unreadable(std::io::Error),
    Stale {
        age_days: i64,
        max_age_days: u32,
        last_modified: DateTime<Utc>,
    },
}

impl FileProblem {
    fn into_issue(self, name: &str, path: &str, required: bool) -> DependencyIssue {
        match self {
            FileProblem::Missing => DependencyIssue::new(
                name,
                IssueReason::NotFound,
                required,
                format!("'{}' not found at {}", name, path),
            )
            .with_metadata("path", path),
            FileProblem::Unreadable(error) => DependencyIssue::new(
                name,
                IssueReason::NotFound,
                required,
                format!("'{}' could not be read at {}: {}", name, path, error),
            )
            .with_metadata("path", path)
            .with_metadata("io_error", error.to_string()),
            FileProblem::Stale {
                age_days,
                max_age_days,
                last_modified,
            } => DependencyIssue::new(
                name,
                IssueReason::TooOld,
                required,
                format!(
                    "'{}' is {} days old (max {} days)",
                    name, age_days, max_age_days
                ),
            )
            .with_metadata("path", path)
            .with_metadata("age_days", age_days)
            .with_metadata("max_age_days", max_age_days)
            .with_metadata("last_modified", last_modified.to_rfc3339()),
        }
    }
}

/// Existence and age check. The age comparison is strictly greater-than,
/// so a file exactly `max_age_days` old is still fresh.
fn check_file(path: &str, max_age_days: Option<u32>, now: DateTime<Utc>) -> Result<(), FileProblem> {
    let metadata = std::fs::metadata(Path::new(path)).map_err(|e| match e.kind() {
        ErrorKind::NotFound => FileProblem::Missing,
        _ => FileProblem::Unreadable(e),
    })?;

    let Some(max_age_days) = max_age_days else {
        return Ok(());
    };

    let modified = match metadata.modified() {
        Ok(t) => DateTime::<Utc>::from(t),
        Err(e) => {
            debug!("Cannot read mtime of {}: {}; treating as fresh", path, e);
            return Ok(());
        }
    };

    let age_days = (now - modified).num_days();
    if age_days > i64::from(max_age_days) {
        Err(FileProblem::Stale {
            age_days,
            max_age_days,
            last_modified: modified,
        })
    } else {
        Ok(())
    }
}

// ============================================================================
// Param parsing
// ============================================================================

/// Accepts integers, integral floats and numeric strings. Negative or
/// non-numeric values cannot be a day count and are rejected.
fn parse_max_age(policy: PolicyKind, params: &Map<String, Value>) -> Result<Option<u32>, PolicyError> {
    let invalid = |reason: String| PolicyError::InvalidParam {
        policy: policy.to_string(),
        param: "max_age_days".to_string(),
        reason,
    };

    let days = match params.get("max_age_days") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i,
            (None, Some(f)) if f.fract() == 0.0 => f as i64,
            _ => return Err(invalid(format!("expected a whole number of days, got {}", n))),
        },
        Some(Value::String(s)) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => i,
                Err(_) => match s.parse::<f64>() {
                    Ok(f) if f.is_finite() && f.fract() == 0.0 => f as i64,
                    _ => return Err(invalid(format!("expected a whole number of days, got \"{}\"", s))),
                },
            }
        }
        Some(other) => return Err(invalid(format!("expected an integer, got {}", other))),
    };

    u32::try_from(days)
        .map(Some)
        .map_err(|_| invalid(format!("must be a non-negative day count, got {}", days)))
}

/// Accepts booleans, `true/false/yes/no/on/off/1/0` strings and numbers (non-zero is true)
fn parse_bool(policy: PolicyKind, param: &str, value: &Value) -> Result<bool, PolicyError> {
    let parsed = match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    };

    parsed.ok_or_else(|| PolicyError::InvalidParam {
        policy: policy.to_string(),
        param: param.to_string(),
        reason: format!("expected a boolean, got {}", value),
    })
}

/// Accepts a list of scalars or a single bare string. Scalars other than
/// strings are kept in their JSON text form.
fn parse_string_set(
    policy: PolicyKind,
    param: &str,
    value: &Value,
) -> Result<BTreeSet<String>, PolicyError> {
    let invalid = || PolicyError::InvalidParam {
        policy: policy.to_string(),
        param: param.to_string(),
        reason: format!("expected a list of strings, got {}", value),
    };

    let scalar = |v: &Value| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    };

    match value {
        Value::String(s) => Ok(BTreeSet::from([s.clone()])),
        Value::Array(items) => items.iter().map(|v| scalar(v).ok_or_else(invalid)).collect(),
        _ => Err(invalid()),
    }
}
