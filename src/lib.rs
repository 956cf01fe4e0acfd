//! # OptiMoldIQ workflow orchestration
//!
//! A declarative dependency-resolution and execution engine for
//! manufacturing-operations workflows.
//!
//! ## Features
//!
//! - **Declarative JSON workflows** - Ordered module steps with required/optional semantics
//! - **Pluggable dependency policies** - Strict, flexible and hybrid rules for where a
//!   prerequisite may come from and how fresh it must be
//! - **Execution cache** - Each module runs at most once per executor until cleared
//! - **Workflow chains** - Run several workflows in order, stopping or continuing on failure
//!
//! ## Policies
//!
//! - **strict** (default): dependencies must be produced by the same workflow
//! - **flexible**: dependencies are read from disk; only listed ones are required
//! - **hybrid**: workflow first, disk as a fallback
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use optimoldiq::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Business modules are registered by the embedding application
//!     let registry = ModuleRegistry::new().with_registry_file("configs/module_registry.yaml")?;
//!
//!     let mut orchestrator = Orchestrator::new("workflows", registry)?;
//!     let chain = orchestrator
//!         .execute_chain(&["data_pipeline", "analytics"], true)
//!         .await?;
//!
//!     println!("Chain completed: success={}", chain.is_success());
//!     Ok(())
//! }
//! ```

pub mod dependency;
pub mod engine;
pub mod module;
pub mod workflow;

// Re-export main types
pub use dependency::{
    DependencyIssue, DependencyPolicy, DependencyPolicyFactory, DependencySource,
    DependencyValidationResult, FlexibleDependencyPolicy, HybridDependencyPolicy, IssueReason,
    PolicyError, PolicyKind, PolicySchema, PolicySpec, StrictWorkflowPolicy,
};
pub use engine::{
    ChainResult, ExecutorError, ModuleResultView, Orchestrator, OrchestratorError,
    WorkflowExecutor, WorkflowExecutorResult, WorkflowStatus,
};
pub use module::{
    Module, ModuleError, ModuleRegistry, ModuleResult, ModuleStatus, RegistryEntry, RegistryError,
};
pub use workflow::{
    LoadError, ModuleStep, OrchestratorConfig, WorkflowDefinition, WorkflowLoader,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dependency::{
        DependencyPolicy, DependencyPolicyFactory, DependencyValidationResult, IssueReason,
        PolicyKind, PolicySpec,
    };
    pub use crate::engine::{
        ChainResult, Orchestrator, OrchestratorError, WorkflowExecutor, WorkflowExecutorResult,
        WorkflowStatus,
    };
    pub use crate::module::{Module, ModuleError, ModuleRegistry, ModuleResult, ModuleStatus};
    pub use crate::workflow::{ModuleStep, OrchestratorConfig, WorkflowDefinition, WorkflowLoader};
}
