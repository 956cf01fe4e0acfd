//! Top-level orchestrator
//!
//! Discovers workflow definitions in a directory, validates them all up
//! front, and runs them one at a time or as ordered chains. Each workflow
//! gets its own lazily created [`WorkflowExecutor`], so execution caches are
//! never shared between workflows.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::error::ExecutorError;
use super::executor::WorkflowExecutor;
use super::result::{ChainResult, WorkflowExecutorResult};
use crate::module::{ModuleRegistry, RegistryError};
use crate::workflow::{LoadError, OrchestratorConfig, WorkflowDefinition, WorkflowLoader};

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Workflow validation failed:\n  {}", .0.join("\n  "))]
    Validation(Vec<String>),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Chain not found: {0}")]
    ChainNotFound(String),
}

pub struct Orchestrator {
    workflows_dir: PathBuf,
    registry: Arc<ModuleRegistry>,
    workflows: BTreeMap<String, WorkflowDefinition>,
    executors: HashMap<String, WorkflowExecutor>,
    chains: HashMap<String, Vec<String>>,
    stop_on_failure: bool,
}

impl Orchestrator {
    /// Discover and validate every workflow in `workflows_dir`
    pub fn new(
        workflows_dir: impl AsRef<Path>,
        registry: ModuleRegistry,
    ) -> Result<Self, OrchestratorError> {
        let workflows_dir = workflows_dir.as_ref().to_path_buf();
        let workflows = Self::discover(&workflows_dir)?;

        info!(
            "Discovered {} workflows in {}",
            workflows.len(),
            workflows_dir.display()
        );

        Ok(Self {
            workflows_dir,
            registry: Arc::new(registry),
            workflows,
            executors: HashMap::new(),
            chains: HashMap::new(),
            stop_on_failure: true,
        })
    }

    /// Build from an orchestrator config, merging its registry file into `registry`
    pub fn from_config(
        config: &OrchestratorConfig,
        registry: ModuleRegistry,
    ) -> Result<Self, OrchestratorError> {
        let registry = match &config.module_registry {
            Some(path) => registry.with_registry_file(path)?,
            None => registry,
        };

        let mut orchestrator = Self::new(&config.workflows_dir, registry)?;
        orchestrator.chains = config.chains.clone();
        orchestrator.stop_on_failure = config.stop_on_failure;
        Ok(orchestrator)
    }

    /// Load all workflows in `dir`.
    ///
    /// Files with invalid JSON are skipped (and logged). Any structural or
    /// policy problem in the remaining files fails the whole discovery with
    /// every problem listed.
    pub fn discover(dir: &Path) -> Result<BTreeMap<String, WorkflowDefinition>, OrchestratorError> {
        let discovery = WorkflowLoader::discover(dir)?;

        if !discovery.skipped.is_empty() {
            warn!(
                "Skipped {} unreadable workflow files in {}",
                discovery.skipped.len(),
                dir.display()
            );
        }

        if !discovery.problems.is_empty() {
            return Err(OrchestratorError::Validation(discovery.problems));
        }

        Ok(discovery.workflows)
    }

    pub fn workflows_dir(&self) -> &Path {
        &self.workflows_dir
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Discovered workflow names, sorted
    pub fn list_workflows(&self) -> Vec<String> {
        self.workflows.keys().cloned().collect()
    }

    pub fn get_workflow_info(&self, name: &str) -> Result<&WorkflowDefinition, OrchestratorError> {
        self.workflows
            .get(name)
            .ok_or_else(|| OrchestratorError::WorkflowNotFound(name.to_string()))
    }

    pub fn has_executor(&self, name: &str) -> bool {
        self.executors.contains_key(name)
    }

    /// The executor for `name`, created on first use
    pub fn get_or_create_executor(
        &mut self,
        name: &str,
    ) -> Result<&mut WorkflowExecutor, OrchestratorError> {
        if !self.workflows.contains_key(name) {
            return Err(OrchestratorError::WorkflowNotFound(name.to_string()));
        }

        let registry = &self.registry;
        Ok(self
            .executors
            .entry(name.to_string())
            .or_insert_with(|| WorkflowExecutor::new(Arc::clone(registry))))
    }

    #[instrument(skip(self))]
    pub async fn execute_workflow(
        &mut self,
        name: &str,
        clear_cache: bool,
    ) -> Result<WorkflowExecutorResult, OrchestratorError> {
        let definition = self
            .workflows
            .get(name)
            .ok_or_else(|| OrchestratorError::WorkflowNotFound(name.to_string()))?;

        let registry = &self.registry;
        let executor = self
            .executors
            .entry(name.to_string())
            .or_insert_with(|| WorkflowExecutor::new(Arc::clone(registry)));

        Ok(executor.execute(definition, clear_cache).await?)
    }

    /// Run workflows in order.
    ///
    /// With `stop_on_failure`, the chain ends after the first failed
    /// workflow (which is included in the result). Unknown names are
    /// rejected before anything runs.
    #[instrument(skip(self, names))]
    pub async fn execute_chain<S: AsRef<str>>(
        &mut self,
        names: &[S],
        stop_on_failure: bool,
    ) -> Result<ChainResult, OrchestratorError> {
        if let Some(unknown) = names
            .iter()
            .map(AsRef::as_ref)
            .find(|n| !self.workflows.contains_key(*n))
        {
            return Err(OrchestratorError::WorkflowNotFound(unknown.to_string()));
        }

        let mut results = ChainResult::new();

        for name in names.iter().map(AsRef::as_ref) {
            info!("Chain: running workflow {}", name);
            let result = self.execute_workflow(name, false).await?;
            let failed = !result.is_success();
            results.insert(name, result);

            if failed {
                if stop_on_failure {
                    warn!("Chain: workflow {} failed; stopping", name);
                    break;
                }
                warn!("Chain: workflow {} failed; continuing", name);
            }
        }

        Ok(results)
    }

    /// Run a chain declared in the orchestrator config
    pub async fn execute_named_chain(&mut self, chain: &str) -> Result<ChainResult, OrchestratorError> {
        let names = self
            .chains
            .get(chain)
            .cloned()
            .ok_or_else(|| OrchestratorError::ChainNotFound(chain.to_string()))?;
        let stop_on_failure = self.stop_on_failure;
        self.execute_chain(&names, stop_on_failure).await
    }

    pub fn clear_all_caches(&mut self) {
        for executor in self.executors.values_mut() {
            executor.clear_cache();
        }
    }

    /// Cached module count per workflow that has an executor
    pub fn get_cache_stats(&self) -> BTreeMap<String, usize> {
        self.executors
            .iter()
            .map(|(name, executor)| (name.clone(), executor.cached_count()))
            .collect()
    }
}
