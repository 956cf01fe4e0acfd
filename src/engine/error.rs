//! Executor error types

use crate::dependency::PolicyError;
use crate::module::RegistryError;

/// Engine-internal errors raised while executing a workflow.
///
/// Module failures and unmet dependencies are not errors: they are reported
/// in the returned result.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Invalid dependency policy for module {module}: {source}")]
    Policy {
        module: String,
        #[source]
        source: PolicyError,
    },
}
