//! Integration tests for the graph engine's scheduling scenarios.
//!
//! These exercise the public API end to end:
//! - Linear chain: topological order, critical chain, unblocking
//! - Diamond: join nodes stay blocked until every branch completes
//! - Disconnected graph: components and degenerate statistics

use waypoint::models::Node;
use waypoint::models::graph::Graph;

fn minutes_node(id: &str, title: &str, minutes: u32) -> Node {
    Node::new(id, title).with_estimate(minutes)
}

#[test]
fn test_linear_chain_scenario() {
    let mut graph = Graph::new();
    graph.add_node(minutes_node("a", "Draft", 10)).unwrap();
    graph.add_node(minutes_node("b", "Review", 10)).unwrap();
    graph.add_node(minutes_node("c", "Publish", 10)).unwrap();
    graph.add_edge("a", "b").unwrap();
    graph.add_edge("b", "c").unwrap();

    let order: Vec<_> = graph
        .topological_sort()
        .expect("chain must sort")
        .iter()
        .map(|n| n.id.clone())
        .collect();
    assert_eq!(order, vec!["a", "b", "c"]);

    let stats = graph.statistics();
    assert_eq!(stats.longest_path, 3);
    assert_eq!(stats.root_count, 1);
    assert_eq!(stats.leaf_count, 1);

    assert!(graph.is_blocked("b"));
    graph.mark_completed("a");
    assert!(!graph.is_blocked("b"));
}

#[test]
fn test_diamond_scenario() {
    let mut graph = Graph::new();
    for (id, title) in [("a", "Spec"), ("b", "Backend"), ("c", "Frontend"), ("d", "Launch")] {
        graph.add_node(Node::new(id, title)).unwrap();
    }
    graph.add_edge("a", "b").unwrap();
    graph.add_edge("a", "c").unwrap();
    graph.add_edge("b", "d").unwrap();
    graph.add_edge("c", "d").unwrap();

    assert_eq!(graph.statistics().longest_path, 3);

    // d blocked until both branches complete
    graph.mark_completed("a");
    graph.mark_completed("b");
    assert!(graph.is_blocked("d"));
    graph.mark_completed("c");
    assert!(!graph.is_blocked("d"));
}

#[test]
fn test_disconnected_graph_scenario() {
    let mut graph = Graph::new();
    graph.add_node(Node::new("e", "Island one")).unwrap();
    graph.add_node(Node::new("f", "Island two")).unwrap();

    let stats = graph.statistics();
    assert_eq!(stats.root_count, 2);
    assert_eq!(stats.leaf_count, 2);
    assert_eq!(stats.longest_path, 1);
    assert_eq!(stats.component_count, 2);

    let order: Vec<_> = graph
        .topological_sort()
        .expect("edge-free graph must sort")
        .iter()
        .map(|n| n.id.clone())
        .collect();
    assert_eq!(order.len(), 2);
    assert!(order.contains(&"e".to_string()));
    assert!(order.contains(&"f".to_string()));
}

#[test]
fn test_cycle_rejection_leaves_graph_intact() {
    let mut graph = Graph::new();
    for id in ["a", "b", "c"] {
        graph.add_node(Node::new(id, id.to_uppercase())).unwrap();
    }
    graph.add_edge("a", "b").unwrap();
    graph.add_edge("b", "c").unwrap();

    let before: Vec<_> = graph.edges().map(|(f, t)| (f.to_string(), t.to_string())).collect();
    assert!(graph.add_edge("c", "a").is_err());
    let after: Vec<_> = graph.edges().map(|(f, t)| (f.to_string(), t.to_string())).collect();
    assert_eq!(before, after);

    // The engine stays consistent after the rejection
    assert!(graph.topological_sort().is_some());
    assert!(graph.validate().is_empty());
}

#[test]
fn test_progress_tracking_over_time() {
    let mut graph = Graph::new();
    for i in 0..4 {
        graph
            .add_node(Node::new(format!("t{i}"), format!("Task {i}")))
            .unwrap();
    }
    graph.add_edge("t0", "t1").unwrap();
    graph.add_edge("t1", "t2").unwrap();
    graph.add_edge("t2", "t3").unwrap();

    assert_eq!(graph.statistics().completion_percentage, 0.0);

    // Work through the chain front to back
    for (done, id) in ["t0", "t1", "t2", "t3"].iter().enumerate() {
        let ready: Vec<_> = graph.ready_nodes().iter().map(|n| n.id.clone()).collect();
        assert_eq!(ready, vec![id.to_string()]);
        graph.mark_completed(id);
        let expected = ((done + 1) as f64 / 4.0) * 100.0;
        assert_eq!(graph.statistics().completion_percentage, expected);
    }
    assert!(graph.ready_nodes().is_empty());
    assert!(graph.blocked_nodes().is_empty());
}
