#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use optimoldiq::{Module, ModuleError, ModuleRegistry, ModuleResult};
use serde_json::json;
use tempfile::TempDir;

pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

pub fn write_workflow(dir: &Path, filename: &str, content: &str) {
    fs::write(dir.join(filename), content).expect("Failed to write workflow file");
}

/// A workflow whose steps are `(module, required)` with default policies
pub fn workflow_json(name: &str, steps: &[(&str, bool)]) -> String {
    let modules: Vec<_> = steps
        .iter()
        .map(|(module, required)| json!({"module": module, "required": required}))
        .collect();
    json!({"workflow_name": name, "modules": modules}).to_string()
}

/// What a test module does when executed
#[derive(Debug, Clone)]
pub enum Behaviour {
    Succeed,
    /// Returns Ok with a failed result
    Fail(String),
    /// Returns a ModuleError
    Error(String),
    Panic(String),
}

#[derive(Clone)]
struct Spec {
    name: String,
    dependencies: BTreeMap<String, String>,
    behaviour: Behaviour,
    calls: Arc<AtomicUsize>,
    configs: Arc<Mutex<Vec<Option<PathBuf>>>>,
}

pub struct TestModule {
    spec: Spec,
    config: Option<PathBuf>,
}

#[async_trait]
impl Module for TestModule {
    fn module_name(&self) -> &str {
        &self.spec.name
    }

    fn dependencies(&self) -> BTreeMap<String, String> {
        self.spec.dependencies.clone()
    }

    async fn execute(&self) -> Result<ModuleResult, ModuleError> {
        self.spec.calls.fetch_add(1, Ordering::SeqCst);
        match &self.spec.behaviour {
            Behaviour::Succeed => Ok(ModuleResult::success(
                json!({"module": self.spec.name, "config": self.config}),
                format!("{} done", self.spec.name),
            )),
            Behaviour::Fail(msg) => Ok(ModuleResult::failed(msg.clone(), vec![msg.clone()])),
            Behaviour::Error(msg) => Err(ModuleError::Execution(msg.clone())),
            Behaviour::Panic(msg) => panic!("{}", msg),
        }
    }
}

/// Builds a registry of test modules and tracks how often each ran
#[derive(Default)]
pub struct Fixture {
    specs: Vec<Spec>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(self, name: &str) -> Self {
        self.module_with(name, &[], Behaviour::Succeed)
    }

    pub fn module_with(mut self, name: &str, deps: &[(&str, &str)], behaviour: Behaviour) -> Self {
        self.specs.push(Spec {
            name: name.to_string(),
            dependencies: deps
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            behaviour,
            calls: Arc::new(AtomicUsize::new(0)),
            configs: Arc::new(Mutex::new(Vec::new())),
        });
        self
    }

    fn spec(&self, name: &str) -> &Spec {
        self.specs
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("no test module named {}", name))
    }

    /// Number of `execute` calls on `name`
    pub fn calls(&self, name: &str) -> usize {
        self.spec(name).calls.load(Ordering::SeqCst)
    }

    /// Config paths `name` was constructed with, in order
    pub fn configs(&self, name: &str) -> Vec<Option<PathBuf>> {
        self.spec(name).configs.lock().unwrap().clone()
    }

    pub fn registry(&self) -> ModuleRegistry {
        self.specs.iter().fold(ModuleRegistry::new(), |registry, spec| {
            let spec = spec.clone();
            registry.register(spec.name.clone(), move |config: Option<PathBuf>| {
                spec.configs.lock().unwrap().push(config.clone());
                Box::new(TestModule {
                    spec: spec.clone(),
                    config,
                }) as Box<dyn Module>
            })
        })
    }
}
