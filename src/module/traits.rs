//! The `Module` trait and its result type
//!
//! A module is a unit of business logic (ETL, validation, planning, ...) that
//! reads its own inputs from the shared filesystem at the paths it declares in
//! `dependencies()`. The engine never passes data into a module; it only
//! decides whether those paths can be trusted.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a module run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    Success,
    Failed,
    Skipped,
}

impl std::fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleStatus::Success => f.write_str("success"),
            ModuleStatus::Failed => f.write_str("failed"),
            ModuleStatus::Skipped => f.write_str("skipped"),
        }
    }
}

/// Result of a module execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleResult {
    pub status: ModuleStatus,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ModuleResult {
    pub fn success(data: Value, message: impl Into<String>) -> Self {
        Self {
            status: ModuleStatus::Success,
            data,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn failed(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            status: ModuleStatus::Failed,
            data: Value::Null,
            message: message.into(),
            errors,
        }
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            status: ModuleStatus::Skipped,
            data: Value::Null,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ModuleStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status == ModuleStatus::Failed
    }

    pub fn is_skipped(&self) -> bool {
        self.status == ModuleStatus::Skipped
    }
}

/// Errors a module may raise from `execute`
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data error: {0}")]
    Data(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Execution(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The contract every business module fulfils
#[async_trait]
pub trait Module: Send + Sync {
    fn module_name(&self) -> &str;

    /// Prerequisites this module reads: dependency name -> path
    fn dependencies(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    async fn execute(&self) -> Result<ModuleResult, ModuleError>;

    /// Run `execute`, folding errors and panics into a failed result
    async fn safe_execute(&self) -> ModuleResult {
        match AssertUnwindSafe(self.execute()).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => ModuleResult::failed(
                format!("{} failed: {}", self.module_name(), e),
                vec![e.to_string()],
            ),
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                ModuleResult::failed(
                    format!("{} panicked: {}", self.module_name(), reason),
                    vec![reason],
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed(Result<ModuleResult, String>);

    #[async_trait]
    impl Module for Fixed {
        fn module_name(&self) -> &str {
            "Fixed"
        }

        async fn execute(&self) -> Result<ModuleResult, ModuleError> {
            self.0.clone().map_err(ModuleError::Execution)
        }
    }

    struct Panicking;

    #[async_trait]
    impl Module for Panicking {
        fn module_name(&self) -> &str {
            "Panicking"
        }

        async fn execute(&self) -> Result<ModuleResult, ModuleError> {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn test_safe_execute_passes_through_success() {
        let module = Fixed(Ok(ModuleResult::success(json!({"rows": 3}), "done")));
        let result = module.safe_execute().await;
        assert!(result.is_success());
        assert_eq!(result.data["rows"], 3);
    }

    #[tokio::test]
    async fn test_safe_execute_folds_errors() {
        let module = Fixed(Err("missing column".to_string()));
        let result = module.safe_execute().await;
        assert!(result.is_failed());
        assert_eq!(result.errors, vec!["missing column".to_string()]);
    }

    #[tokio::test]
    async fn test_safe_execute_folds_panics() {
        let result = Panicking.safe_execute().await;
        assert!(result.is_failed());
        assert_eq!(result.errors, vec!["boom".to_string()]);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(ModuleResult::skipped("no deps")).unwrap();
        assert_eq!(json["status"], "skipped");
        assert!(json.get("errors").is_none());
    }
}
