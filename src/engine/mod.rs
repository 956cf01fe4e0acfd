//! Workflow execution engine module
//!
//! This module contains:
//! - `executor` - Runs one workflow's module steps with a per-executor cache
//! - `orchestrator` - Discovers workflows and runs them singly or as chains
//! - `error` - Executor error types
//! - `result` - Module, workflow and chain result types

pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod result;

pub use error::ExecutorError;
pub use executor::WorkflowExecutor;
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use result::{
    ChainResult, ExecutionSummary, ModuleResultView, OrderedResults, WorkflowExecutorResult,
    WorkflowStatus,
};
