//! Dependency policy factory
//!
//! Builds a [`DependencyPolicy`] from the declarative form found in workflow
//! files, either a bare name or a name with params:
//!
//! ```json
//! "dependency_policy": "strict"
//! "dependency_policy": {"name": "flexible", "params": {"max_age_days": 7}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::policy::{
    DependencyPolicy, FlexibleDependencyPolicy, HybridDependencyPolicy, PolicyKind,
    StrictWorkflowPolicy,
};

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Unknown dependency policy: '{0}' (expected strict, flexible or hybrid)")]
    UnknownPolicy(String),

    #[error("Unknown params for policy '{policy}': {params:?}")]
    UnknownParams { policy: String, params: Vec<String> },

    #[error("Missing required params for policy '{policy}': {params:?}")]
    MissingParams { policy: String, params: Vec<String> },

    #[error("Invalid value for '{param}' in policy '{policy}': {reason}")]
    InvalidParam {
        policy: String,
        param: String,
        reason: String,
    },
}

/// Declarative policy configuration as written in a workflow file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolicySpec {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        params: Map<String, Value>,
    },
}

impl Default for PolicySpec {
    fn default() -> Self {
        PolicySpec::Name(PolicyKind::Strict.to_string())
    }
}

impl PolicySpec {
    pub fn name(&self) -> &str {
        match self {
            PolicySpec::Name(name) => name,
            PolicySpec::Full { name, .. } => name,
        }
    }
}

impl From<&str> for PolicySpec {
    fn from(name: &str) -> Self {
        PolicySpec::Name(name.to_string())
    }
}

/// Expected JSON shape of a policy param
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// A list of strings, treated as a set
    StringSet,
    /// An integer, or null for "unset"
    OptionalInteger,
    Boolean,
}

impl ParamKind {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamKind::StringSet => value
                .as_array()
                .map(|items| items.iter().all(Value::is_string))
                .unwrap_or(false),
            ParamKind::OptionalInteger => value.is_null() || value.is_i64() || value.is_u64(),
            ParamKind::Boolean => value.is_boolean(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
}

/// Parameter schema of one policy kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicySchema {
    pub description: &'static str,
    pub required_params: Vec<ParamSpec>,
    pub optional_params: Vec<ParamSpec>,
    pub defaults: Map<String, Value>,
}

impl PolicySchema {
    fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.required_params
            .iter()
            .chain(self.optional_params.iter())
            .find(|p| p.name == name)
    }
}

const MAX_AGE_DAYS: ParamSpec = ParamSpec {
    name: "max_age_days",
    kind: ParamKind::OptionalInteger,
    description: "Maximum age in days of a filesystem dependency; omit to skip the age check",
};

pub struct DependencyPolicyFactory;

impl DependencyPolicyFactory {
    /// Build a policy from a workflow-file spec
    pub fn create(spec: &PolicySpec) -> Result<DependencyPolicy, PolicyError> {
        match spec {
            PolicySpec::Name(name) => Self::create_default(name.parse()?),
            PolicySpec::Full { name, params } => Self::create_from_dict(name, params),
        }
    }

    /// `None` in, `None` out; callers decide what a missing policy means
    pub fn create_optional(
        spec: Option<&PolicySpec>,
    ) -> Result<Option<DependencyPolicy>, PolicyError> {
        spec.map(Self::create).transpose()
    }

    pub fn create_default(kind: PolicyKind) -> Result<DependencyPolicy, PolicyError> {
        Self::construct(kind, &Map::new())
    }

    /// Validate `params` against the policy's schema, then construct it.
    ///
    /// Unknown and missing keys are errors. A type mismatch is only logged;
    /// the value is handed to the constructor unchanged, which may still
    /// reject it.
    pub fn create_from_dict(
        name: &str,
        params: &Map<String, Value>,
    ) -> Result<DependencyPolicy, PolicyError> {
        let kind: PolicyKind = name.parse()?;
        let schema = Self::get_schema(kind);

        let unknown: Vec<String> = params
            .keys()
            .filter(|k| schema.param(k).is_none())
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(PolicyError::UnknownParams {
                policy: kind.to_string(),
                params: unknown,
            });
        }

        let missing: Vec<String> = schema
            .required_params
            .iter()
            .filter(|p| !params.contains_key(p.name))
            .map(|p| p.name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PolicyError::MissingParams {
                policy: kind.to_string(),
                params: missing,
            });
        }

        for (key, value) in params {
            if let Some(spec) = schema.param(key) {
                if !spec.kind.matches(value) {
                    warn!(
                        "Policy '{}' param '{}' expected {:?}, got {}",
                        kind, key, spec.kind, value
                    );
                }
            }
        }

        Self::construct(kind, params)
    }

    fn construct(
        kind: PolicyKind,
        params: &Map<String, Value>,
    ) -> Result<DependencyPolicy, PolicyError> {
        Ok(match kind {
            PolicyKind::Strict => DependencyPolicy::Strict(StrictWorkflowPolicy),
            PolicyKind::Flexible => {
                DependencyPolicy::Flexible(FlexibleDependencyPolicy::from_params(params)?)
            }
            PolicyKind::Hybrid => {
                DependencyPolicy::Hybrid(HybridDependencyPolicy::from_params(params)?)
            }
        })
    }

    pub fn get_schema(kind: PolicyKind) -> PolicySchema {
        match kind {
            PolicyKind::Strict => PolicySchema {
                description: Self::describe(kind),
                required_params: vec![],
                optional_params: vec![],
                defaults: Map::new(),
            },
            PolicyKind::Flexible => {
                let mut defaults = Map::new();
                defaults.insert("required_deps".into(), Value::Array(vec![]));
                defaults.insert("max_age_days".into(), Value::Null);
                PolicySchema {
                    description: Self::describe(kind),
                    required_params: vec![],
                    optional_params: vec![
                        ParamSpec {
                            name: "required_deps",
                            kind: ParamKind::StringSet,
                            description: "Dependencies whose absence blocks the module; all others only warn",
                        },
                        MAX_AGE_DAYS,
                    ],
                    defaults,
                }
            }
            PolicyKind::Hybrid => {
                let mut defaults = Map::new();
                defaults.insert("max_age_days".into(), Value::Null);
                defaults.insert("prefer_workflow".into(), Value::Bool(true));
                PolicySchema {
                    description: Self::describe(kind),
                    required_params: vec![],
                    optional_params: vec![
                        MAX_AGE_DAYS,
                        ParamSpec {
                            name: "prefer_workflow",
                            kind: ParamKind::Boolean,
                            description: "Warn when a dependency falls back to the database",
                        },
                    ],
                    defaults,
                }
            }
        }
    }

    /// Look up a schema by policy name
    pub fn get_schema_by_name(name: &str) -> Result<PolicySchema, PolicyError> {
        Ok(Self::get_schema(name.parse()?))
    }

    pub fn list_policies() -> Vec<(PolicyKind, &'static str)> {
        PolicyKind::ALL
            .iter()
            .map(|kind| (*kind, Self::describe(*kind)))
            .collect()
    }

    fn describe(kind: PolicyKind) -> &'static str {
        match kind {
            PolicyKind::Strict => {
                "Every dependency must be produced by a module declared in the same workflow"
            }
            PolicyKind::Flexible => {
                "Dependencies are read from the database; only listed ones are required, with an optional age limit"
            }
            PolicyKind::Hybrid => {
                "Dependencies come from the workflow when declared there, otherwise from the database with an optional age limit"
            }
        }
    }
}
