//! Integration tests for the plan adapter.
//!
//! These verify the storage-boundary contract: a plan builds into a
//! graph, mutations fold back into the plan, and the result survives a
//! trip through a real file on disk.

use tempfile::TempDir;
use waypoint::plan::{apply_graph, build_graph, Plan, PlanDependency, PlanTask};

fn release_plan() -> Plan {
    let mut plan = Plan::new("Release");
    for (id, title) in [
        ("wp-0001", "Write spec"),
        ("wp-0002", "Build"),
        ("wp-0003", "Test"),
        ("wp-0004", "Ship"),
    ] {
        plan.tasks.push(PlanTask::new(id, title));
    }
    for (from, to) in [
        ("wp-0001", "wp-0002"),
        ("wp-0002", "wp-0003"),
        ("wp-0003", "wp-0004"),
    ] {
        plan.dependencies.push(PlanDependency {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    plan
}

#[test]
fn test_mutate_and_roundtrip_through_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("release.json");

    let mut plan = release_plan();
    let mut graph = build_graph(&plan).unwrap();

    // Work the first task, drop the final handoff edge
    graph.mark_completed("wp-0001");
    graph.remove_edge("wp-0003", "wp-0004");
    apply_graph(&mut plan, &graph);

    plan.save(&path).unwrap();
    let reloaded = Plan::load(&path).unwrap();
    assert_eq!(reloaded, plan);

    // The reloaded plan builds back into the same graph state
    let rebuilt = build_graph(&reloaded).unwrap();
    assert!(rebuilt.get("wp-0001").unwrap().completed);
    assert!(!rebuilt.get("wp-0002").unwrap().completed);
    assert_eq!(rebuilt.edge_count(), 2);
    assert!(!rebuilt.is_blocked("wp-0002"));
    assert!(!rebuilt.is_blocked("wp-0004"));
}

#[test]
fn test_load_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = Plan::load(&dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, waypoint::Error::Io(_)));
}

#[test]
fn test_load_malformed_json_is_json_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{not json").unwrap();
    let err = Plan::load(&path).unwrap_err();
    assert!(matches!(err, waypoint::Error::Json(_)));
}

#[test]
fn test_corrupt_plan_surfaces_validation_error() {
    let mut plan = release_plan();
    plan.dependencies.push(PlanDependency {
        from: "wp-0004".to_string(),
        to: "wp-0001".to_string(),
    });
    let err = build_graph(&plan).unwrap_err();
    assert!(matches!(err, waypoint::Error::Validation(_)));
}

#[test]
fn test_minimal_plan_document_parses() {
    // A plan persisted by an older writer: only required fields present
    let json = r#"{
        "name": "Sparse",
        "tasks": [{"id":"wp-0001","title":"Only task",
                   "created_at":"2026-01-01T00:00:00Z",
                   "updated_at":"2026-01-01T00:00:00Z"}],
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z"
    }"#;
    let plan: Plan = serde_json::from_str(json).unwrap();
    assert!(plan.dependencies.is_empty());

    let graph = build_graph(&plan).unwrap();
    let stats = graph.statistics();
    assert_eq!(stats.total_nodes, 1);
    assert_eq!(stats.longest_path, 1);
    assert_eq!(stats.completion_percentage, 0.0);
}
