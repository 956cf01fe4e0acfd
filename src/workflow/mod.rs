//! Workflow definitions and loading
//!
//! This module contains:
//! - `definition` - WorkflowDefinition and ModuleStep
//! - `loader` - Discover and validate workflow files in a directory
//! - `orchestrator_config` - Orchestrator settings loaded from YAML

pub mod definition;
pub mod loader;
pub mod orchestrator_config;

pub use definition::{ModuleStep, WorkflowDefinition};
pub use loader::{Discovery, LoadError, WorkflowLoader};
pub use orchestrator_config::OrchestratorConfig;
