//! Workflow Executor - Runs one workflow's module steps
//!
//! For each step, in declared order:
//! 1. Resolves the step's dependency policy (strict by default)
//! 2. Validates the module's declared dependencies against it
//! 3. Skips (optional step) or halts (required step) on blocking issues
//! 4. Executes the module, or reuses its cached result
//!
//! The cache is keyed by module name and lives as long as the executor, so
//! a module runs at most once until the cache is cleared.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::dependency::{DependencyPolicy, DependencyPolicyFactory, DependencyValidationResult};
use crate::engine::error::ExecutorError;
use crate::engine::result::{
    ExecutionSummary, ModuleResultView, OrderedResults, WorkflowExecutorResult, WorkflowStatus,
};
use crate::module::{Module, ModuleRegistry, ModuleResult};
use crate::workflow::{ModuleStep, WorkflowDefinition};

/// A finished module run, with the dependencies it declared
#[derive(Debug, Clone)]
struct CachedModule {
    dependencies: BTreeMap<String, String>,
    result: ModuleResult,
}

/// Where a step's result comes from
enum Source {
    Cached(ModuleResult),
    Fresh(Box<dyn Module>),
}

pub struct WorkflowExecutor {
    registry: Arc<ModuleRegistry>,
    cache: HashMap<String, CachedModule>,
}

impl WorkflowExecutor {
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        Self {
            registry,
            cache: HashMap::new(),
        }
    }

    pub fn clear_cache(&mut self) {
        debug!("Clearing {} cached module results", self.cache.len());
        self.cache.clear();
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    pub fn is_cached(&self, module: &str) -> bool {
        self.cache.contains_key(module)
    }

    pub fn cached_result(&self, module: &str) -> Option<&ModuleResult> {
        self.cache.get(module).map(|c| &c.result)
    }

    fn resolve_policy(step: &ModuleStep) -> Result<DependencyPolicy, ExecutorError> {
        match &step.dependency_policy {
            Some(spec) => {
                DependencyPolicyFactory::create(spec).map_err(|source| ExecutorError::Policy {
                    module: step.module.clone(),
                    source,
                })
            }
            None => Ok(DependencyPolicy::default()),
        }
    }

    /// Run a workflow.
    ///
    /// Only engine-internal problems (unknown module, bad policy) are
    /// returned as errors; module and dependency failures end up in the
    /// result.
    #[instrument(skip(self, workflow), fields(workflow_name = %workflow.workflow_name))]
    pub async fn execute(
        &mut self,
        workflow: &WorkflowDefinition,
        clear_cache: bool,
    ) -> Result<WorkflowExecutorResult, ExecutorError> {
        if clear_cache {
            self.clear_cache();
        }

        let execution_id = uuid::Uuid::new_v4().to_string();
        info!(
            "Starting workflow: {} ({} modules, execution {})",
            workflow.workflow_name,
            workflow.modules.len(),
            execution_id
        );

        let workflow_modules = workflow.module_names();
        let mut results: OrderedResults<ModuleResultView> = OrderedResults::new();
        let mut cached_modules: Vec<String> = Vec::new();
        let mut status = WorkflowStatus::Success;

        for step in &workflow.modules {
            let policy = Self::resolve_policy(step)?;

            // Cached modules are not re-instantiated; their declared
            // dependencies were recorded with the result
            let (source, dependencies) = match self.cache.get(&step.module) {
                Some(cached) => (
                    Source::Cached(cached.result.clone()),
                    cached.dependencies.clone(),
                ),
                None => {
                    let module = self
                        .registry
                        .get_module_instance(&step.module, step.config_file.as_deref())?;
                    let dependencies = module.dependencies();
                    (Source::Fresh(module), dependencies)
                }
            };

            let validation = policy.validate(&dependencies, &workflow_modules);
            for issue in &validation.warnings {
                warn!("Module {}: {}", step.module, issue.message);
            }

            if validation.should_block() {
                let result = blocked_result(&validation, step.required);
                results.insert(
                    step.module.clone(),
                    module_view(step, &policy, result, false, validation),
                );

                if step.required {
                    error!(
                        "Required module {} has unmet dependencies; stopping workflow",
                        step.module
                    );
                    status = WorkflowStatus::Failed;
                    break;
                }
                warn!("Skipping module {} due to unmet dependencies", step.module);
                continue;
            }

            let (result, cached) = match source {
                Source::Cached(result) => {
                    info!("Using cached result for module {}", step.module);
                    if !cached_modules.contains(&step.module) {
                        cached_modules.push(step.module.clone());
                    }
                    (result, true)
                }
                Source::Fresh(module) => {
                    info!("Executing module {}", step.module);
                    let result = module.safe_execute().await;
                    self.cache.insert(
                        step.module.clone(),
                        CachedModule {
                            dependencies,
                            result: result.clone(),
                        },
                    );
                    (result, false)
                }
            };

            let failed = result.is_failed();
            if failed {
                for e in &result.errors {
                    debug!("Module {} error: {}", step.module, e);
                }
            }
            results.insert(
                step.module.clone(),
                module_view(step, &policy, result, cached, validation),
            );

            if failed {
                if step.required {
                    error!("Required module {} failed; stopping workflow", step.module);
                    status = WorkflowStatus::Failed;
                    break;
                }
                warn!("Optional module {} failed; continuing", step.module);
            }
        }

        info!(
            "Workflow {} finished: {:?} ({} of {} modules recorded, {} cached)",
            workflow.workflow_name,
            status,
            results.len(),
            workflow.modules.len(),
            cached_modules.len()
        );

        Ok(WorkflowExecutorResult {
            workflow_name: workflow.workflow_name.clone(),
            execution_id,
            status,
            results,
            execution_context: ExecutionSummary {
                cached_modules,
                total_modules: workflow.modules.len(),
            },
        })
    }
}

fn blocked_result(validation: &DependencyValidationResult, required: bool) -> ModuleResult {
    let message = format!("Dependency validation failed: {}", validation.summary());
    let errors = validation.errors.iter().map(|e| e.message.clone()).collect();
    if required {
        ModuleResult::failed(message, errors)
    } else {
        ModuleResult {
            errors,
            ..ModuleResult::skipped(message)
        }
    }
}

fn module_view(
    step: &ModuleStep,
    policy: &DependencyPolicy,
    result: ModuleResult,
    cached: bool,
    dependencies: DependencyValidationResult,
) -> ModuleResultView {
    ModuleResultView {
        result,
        required: step.required,
        cached,
        policy: policy.name(),
        dependencies,
    }
}
