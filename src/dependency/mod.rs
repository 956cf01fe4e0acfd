//! Dependency resolution
//!
//! This module contains:
//! - `issue` - Dependency issue and validation result types
//! - `policy` - The strict, flexible and hybrid dependency policies
//! - `factory` - Building policies from workflow-file specs

pub mod factory;
pub mod issue;
pub mod policy;

pub use factory::{DependencyPolicyFactory, ParamKind, ParamSpec, PolicyError, PolicySchema, PolicySpec};
pub use issue::{
    DependencyIssue, DependencySource, DependencyValidationResult, IssueReason, ResolvedDependency,
};
pub use policy::{
    DependencyPolicy, FlexibleDependencyPolicy, HybridDependencyPolicy, PolicyKind,
    StrictWorkflowPolicy,
};
