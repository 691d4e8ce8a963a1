//! Data models for Waypoint entities.
//!
//! This module defines the core data structures:
//! - `Node` - A unit of work in the dependency graph
//! - `GraphStats` - Derived progress statistics for a whole graph
//! - `graph::Graph` - The dependency graph engine itself

pub mod graph;

use serde::{Deserialize, Serialize};

/// A unit of work tracked in the dependency graph.
///
/// The engine's algorithms only ever read `id`, `completed`, and
/// `sort_index`; everything else is opaque payload carried for the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier (e.g., "wp-a1b2"), stable for the node's lifetime
    pub id: String,

    /// Display title, never interpreted by the engine
    pub title: String,

    /// Estimated effort in minutes; opaque to all graph algorithms
    #[serde(default = "default_estimate")]
    pub estimated_minutes: u32,

    /// Completion flag, the only node state the algorithms read
    #[serde(default)]
    pub completed: bool,

    /// Fallback ordering key for deterministic output when topology
    /// doesn't decide (ties in topological sort, edge-free graphs)
    #[serde(default)]
    pub sort_index: i64,
}

fn default_estimate() -> u32 {
    30
}

impl Node {
    /// Create a new node with the given ID and title.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            estimated_minutes: default_estimate(),
            completed: false,
            sort_index: 0,
        }
    }

    /// Set the effort estimate, in minutes.
    pub fn with_estimate(mut self, minutes: u32) -> Self {
        self.estimated_minutes = minutes;
        self
    }

    /// Set the fallback ordering key.
    pub fn with_sort_index(mut self, sort_index: i64) -> Self {
        self.sort_index = sort_index;
        self
    }
}

/// Progress statistics derived from a graph.
///
/// Always computed fresh from the current node/edge state; never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Total number of nodes
    pub total_nodes: usize,
    /// Number of completed nodes
    pub completed_nodes: usize,
    /// Total number of edges
    pub total_edges: usize,
    /// Completion percentage (0-100)
    pub completion_percentage: f64,
    /// Nodes with no incoming edges
    pub root_count: usize,
    /// Nodes with no outgoing edges
    pub leaf_count: usize,
    /// Length in nodes of the longest directed path (critical chain)
    pub longest_path: usize,
    /// Number of weakly connected components
    pub component_count: usize,
}

impl GraphStats {
    /// Create stats from raw counts, guarding the percentage against an
    /// empty graph.
    pub fn new(
        total_nodes: usize,
        completed_nodes: usize,
        total_edges: usize,
        root_count: usize,
        leaf_count: usize,
        longest_path: usize,
        component_count: usize,
    ) -> Self {
        let completion_percentage = if total_nodes > 0 {
            (completed_nodes as f64 / total_nodes as f64) * 100.0
        } else {
            0.0
        };
        Self {
            total_nodes,
            completed_nodes,
            total_edges,
            completion_percentage,
            root_count,
            leaf_count,
            longest_path,
            component_count,
        }
    }
}
