//! Business module contract
//!
//! This module contains:
//! - `traits` - The `Module` trait, `ModuleResult` and `ModuleError`
//! - `registry` - Name-to-constructor registry merged with an external registry file

pub mod registry;
pub mod traits;

pub use registry::{ModuleConstructor, ModuleRegistry, RegistryEntry, RegistryError};
pub use traits::{Module, ModuleError, ModuleResult, ModuleStatus};
