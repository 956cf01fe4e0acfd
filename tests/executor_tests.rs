mod common;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use common::*;
use optimoldiq::prelude::*;
use optimoldiq::{IssueReason, RegistryEntry};

fn executor(fixture: &Fixture) -> WorkflowExecutor {
    WorkflowExecutor::new(Arc::new(fixture.registry()))
}

fn workflow(steps: Vec<ModuleStep>) -> WorkflowDefinition {
    WorkflowDefinition::new("w1", steps)
}

#[tokio::test]
async fn test_strict_dependency_on_earlier_module() {
    let fixture = Fixture::new()
        .module("M1")
        .module_with("M2", &[("M1", "/shared/m1.parquet")], Behaviour::Succeed);

    let definition: WorkflowDefinition = serde_json::from_str(
        r#"{"workflow_name":"w1","modules":[
            {"module":"M1","required":true},
            {"module":"M2","dependency_policy":"strict","required":false}]}"#,
    )
    .unwrap();

    let result = executor(&fixture).execute(&definition, false).await.unwrap();

    assert_eq!(result.status, WorkflowStatus::Success);
    assert_eq!(result.results.names(), vec!["M1", "M2"]);
    assert!(result.get("M1").unwrap().result.is_success());
    assert!(result.get("M2").unwrap().result.is_success());
    assert_eq!(fixture.calls("M1"), 1);
    assert_eq!(fixture.calls("M2"), 1);
}

#[tokio::test]
async fn test_optional_module_with_unmet_strict_dependency_is_skipped() {
    let fixture = Fixture::new()
        .module("M1")
        .module_with("M2", &[("M3", "/shared/m3.parquet")], Behaviour::Succeed);

    let definition = workflow(vec![
        ModuleStep::new("M1").required(true),
        ModuleStep::new("M2").policy("strict"),
    ]);

    let result = executor(&fixture).execute(&definition, false).await.unwrap();

    assert!(result.is_success());
    let m2 = result.get("M2").unwrap();
    assert_eq!(m2.result.status, ModuleStatus::Skipped);
    assert_eq!(m2.dependencies.errors.len(), 1);
    assert_eq!(
        m2.dependencies.errors[0].reason,
        IssueReason::WorkflowViolation
    );
    assert_eq!(fixture.calls("M2"), 0);
}

#[tokio::test]
async fn test_required_module_with_unmet_dependency_stops_workflow() {
    let fixture = Fixture::new()
        .module("M1")
        .module_with("M2", &[("M9", "/shared/m9.parquet")], Behaviour::Succeed)
        .module("M3");

    let definition = workflow(vec![
        ModuleStep::new("M1"),
        ModuleStep::new("M2").required(true),
        ModuleStep::new("M3"),
    ]);

    let result = executor(&fixture).execute(&definition, false).await.unwrap();

    assert_eq!(result.status, WorkflowStatus::Failed);
    assert_eq!(result.results.names(), vec!["M1", "M2"]);
    assert_eq!(result.get("M2").unwrap().result.status, ModuleStatus::Failed);
    assert!(!result.results.contains("M3"));
    assert_eq!(result.execution_context.total_modules, 3);
    assert_eq!(fixture.calls("M3"), 0);
}

#[tokio::test]
async fn test_optional_module_failure_does_not_stop_workflow() {
    let fixture = Fixture::new()
        .module_with("M1", &[], Behaviour::Fail("bad input".into()))
        .module("M2");

    let definition = workflow(vec![ModuleStep::new("M1"), ModuleStep::new("M2").required(true)]);

    let result = executor(&fixture).execute(&definition, false).await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.get("M1").unwrap().result.status, ModuleStatus::Failed);
    assert!(result.get("M2").unwrap().result.is_success());
}

#[tokio::test]
async fn test_required_module_failure_stops_workflow() {
    let fixture = Fixture::new()
        .module_with("M1", &[], Behaviour::Error("disk full".into()))
        .module("M2");

    let definition = workflow(vec![ModuleStep::new("M1").required(true), ModuleStep::new("M2")]);

    let result = executor(&fixture).execute(&definition, false).await.unwrap();

    assert_eq!(result.status, WorkflowStatus::Failed);
    let m1 = &result.get("M1").unwrap().result;
    assert!(m1.is_failed());
    assert_eq!(m1.errors, vec!["disk full".to_string()]);
    assert!(result.get("M2").is_none());
    assert_eq!(fixture.calls("M2"), 0);
}

#[tokio::test]
async fn test_panicking_module_is_contained() {
    let fixture = Fixture::new()
        .module_with("M1", &[], Behaviour::Panic("index out of range".into()))
        .module("M2");

    let definition = workflow(vec![ModuleStep::new("M1"), ModuleStep::new("M2")]);

    let result = executor(&fixture).execute(&definition, false).await.unwrap();

    assert!(result.is_success());
    assert!(result.get("M1").unwrap().result.is_failed());
    assert!(result.get("M2").unwrap().result.is_success());
}

#[tokio::test]
async fn test_repeated_execute_uses_cache() {
    let fixture = Fixture::new()
        .module("M1")
        .module_with("M2", &[("M1", "/shared/m1.parquet")], Behaviour::Succeed);

    let definition = workflow(vec![ModuleStep::new("M1"), ModuleStep::new("M2")]);
    let mut executor = executor(&fixture);

    let first = executor.execute(&definition, false).await.unwrap();
    assert!(first.execution_context.cached_modules.is_empty());

    let second = executor.execute(&definition, false).await.unwrap();
    assert!(second.is_success());
    assert_eq!(second.execution_context.cached_modules, vec!["M1", "M2"]);
    assert!(second.get("M1").unwrap().cached);
    assert_eq!(
        first.get("M1").unwrap().result,
        second.get("M1").unwrap().result
    );

    assert_eq!(fixture.calls("M1"), 1);
    assert_eq!(fixture.calls("M2"), 1);
    // Cached modules are not even re-instantiated
    assert_eq!(fixture.configs("M1").len(), 1);
}

#[tokio::test]
async fn test_clear_cache_reruns_modules() {
    let fixture = Fixture::new().module("M1");
    let definition = workflow(vec![ModuleStep::new("M1")]);
    let mut executor = executor(&fixture);

    executor.execute(&definition, false).await.unwrap();
    executor.execute(&definition, true).await.unwrap();

    assert_eq!(fixture.calls("M1"), 2);
}

#[tokio::test]
async fn test_duplicate_step_executes_once() {
    let fixture = Fixture::new().module("M1").module("M2");

    let definition = workflow(vec![
        ModuleStep::new("M1"),
        ModuleStep::new("M2"),
        ModuleStep::new("M1"),
    ]);

    let result = executor(&fixture).execute(&definition, false).await.unwrap();

    assert_eq!(fixture.calls("M1"), 1);
    assert_eq!(result.results.names(), vec!["M1", "M2"]);
    assert_eq!(result.execution_context.cached_modules, vec!["M1"]);
    assert_eq!(result.execution_context.total_modules, 3);
}

#[tokio::test]
async fn test_failed_result_is_cached() {
    let fixture = Fixture::new().module_with("M1", &[], Behaviour::Fail("no data".into()));
    let definition = workflow(vec![ModuleStep::new("M1")]);
    let mut executor = executor(&fixture);

    executor.execute(&definition, false).await.unwrap();
    let second = executor.execute(&definition, false).await.unwrap();

    assert_eq!(fixture.calls("M1"), 1);
    assert!(second.get("M1").unwrap().result.is_failed());
}

#[tokio::test]
async fn test_step_config_file_overrides_registry() {
    let fixture = Fixture::new().module("M1").module("M2");

    let mut entries = std::collections::HashMap::new();
    entries.insert(
        "M1".to_string(),
        RegistryEntry {
            config_path: Some(PathBuf::from("registry/m1.yaml")),
            ..RegistryEntry::default()
        },
    );
    entries.insert(
        "M2".to_string(),
        RegistryEntry {
            config_path: Some(PathBuf::from("registry/m2.yaml")),
            ..RegistryEntry::default()
        },
    );
    let registry = fixture.registry().with_entries(entries);

    let definition = workflow(vec![
        ModuleStep::new("M1").config_file("override/m1.yaml"),
        ModuleStep::new("M2"),
    ]);

    let mut executor = WorkflowExecutor::new(Arc::new(registry));
    executor.execute(&definition, false).await.unwrap();

    assert_eq!(
        fixture.configs("M1"),
        vec![Some(PathBuf::from("override/m1.yaml"))]
    );
    assert_eq!(
        fixture.configs("M2"),
        vec![Some(PathBuf::from("registry/m2.yaml"))]
    );
}

#[tokio::test]
async fn test_flexible_policy_reads_filesystem() {
    let dir = create_test_dir();
    let present = dir.path().join("orders.parquet");
    fs::write(&present, "data").unwrap();
    let missing = dir.path().join("molds.parquet");

    let present = present.display().to_string();
    let missing = missing.display().to_string();
    let fixture = Fixture::new().module_with(
        "Planner",
        &[("orders", &present), ("molds", &missing)],
        Behaviour::Succeed,
    );

    let spec: PolicySpec = serde_json::from_str(
        r#"{"name": "flexible", "params": {"required_deps": ["orders"], "max_age_days": 30}}"#,
    )
    .unwrap();
    let definition = workflow(vec![ModuleStep::new("Planner").policy(spec).required(true)]);

    let result = executor(&fixture).execute(&definition, false).await.unwrap();

    assert!(result.is_success());
    let planner = result.get("Planner").unwrap();
    assert_eq!(planner.policy, "flexible");
    assert_eq!(planner.dependencies.warnings.len(), 1);
    assert_eq!(planner.dependencies.warnings[0].name, "molds");
    assert_eq!(fixture.calls("Planner"), 1);
}

#[tokio::test]
async fn test_empty_dependencies_pass_any_policy() {
    let fixture = Fixture::new().module("M1");

    for policy in ["strict", "flexible", "hybrid"] {
        let definition = workflow(vec![ModuleStep::new("M1").policy(policy).required(true)]);
        let result = executor(&fixture)
            .execute(&definition, false)
            .await
            .unwrap();
        assert!(result.is_success(), "policy {}", policy);
    }
}

#[tokio::test]
async fn test_result_serializes_in_declared_order() {
    let fixture = Fixture::new().module("Zeta").module("Alpha");
    let definition = workflow(vec![ModuleStep::new("Zeta"), ModuleStep::new("Alpha")]);

    let result = executor(&fixture).execute(&definition, false).await.unwrap();

    let text = serde_json::to_string(&result).unwrap();
    let zeta = text.find(r#""Zeta":{"#).unwrap();
    let alpha = text.find(r#""Alpha":{"#).unwrap();
    assert!(zeta < alpha, "results out of order: {}", text);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["results"]["Zeta"]["status"], "success");
    assert_eq!(json["execution_context"]["total_modules"], 2);
}
