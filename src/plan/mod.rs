//! Plan adapter - the persistence boundary around the graph engine.
//!
//! A `Plan` is the externally-persisted representation of a set of tasks
//! and their dependency list. The two conversion functions here are the
//! whole contract between storage and the engine: [`build_graph`]
//! constructs a [`Graph`] from a plan, [`apply_graph`] folds a mutated
//! graph back into the plan. The engine never does I/O of its own;
//! [`Plan::load`] and [`Plan::save`] belong to this layer.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::models::Node;
use crate::models::graph::Graph;
use crate::{Error, Result};

/// A persisted task inside a plan.
///
/// Carries the engine-facing fields plus plan-only payload (notes, tags,
/// timestamps) that survives a graph round trip untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTask {
    /// Unique identifier (e.g., "wp-a1b2")
    pub id: String,

    /// Task title
    pub title: String,

    /// Estimated effort in minutes
    #[serde(default = "default_estimate")]
    pub estimated_minutes: u32,

    /// Completion flag
    #[serde(default)]
    pub completed: bool,

    /// Manual ordering key
    #[serde(default)]
    pub sort_index: i64,

    /// Free-form notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Tags for categorization
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

fn default_estimate() -> u32 {
    30
}

impl PlanTask {
    /// Create a new task with the given ID and title.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            estimated_minutes: default_estimate(),
            completed: false,
            sort_index: 0,
            notes: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A persisted dependency: `from` must be satisfied before `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDependency {
    pub from: String,
    pub to: String,
}

/// The externally-persisted plan document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Plan display name
    pub name: String,

    /// All tasks in the plan
    #[serde(default)]
    pub tasks: Vec<PlanTask>,

    /// Previously-validated dependency list
    #[serde(default)]
    pub dependencies: Vec<PlanDependency>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    /// Create a new empty plan.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            tasks: Vec::new(),
            dependencies: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a task with a generated ID, append it, and return the ID.
    pub fn create_task(&mut self, title: impl Into<String>) -> String {
        let title = title.into();
        let id = generate_task_id(&title);
        self.tasks.push(PlanTask::new(id.clone(), title));
        self.updated_at = Utc::now();
        id
    }

    /// Load a plan from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the plan to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Build a graph from a plan's task list and dependency list.
///
/// Every node and edge is inserted through the engine's checked
/// operations, so a corrupt persisted plan (dangling dependency,
/// self-loop, cycle) surfaces as [`Error::Validation`] instead of
/// producing a poisoned graph.
pub fn build_graph(plan: &Plan) -> Result<Graph> {
    let mut graph = Graph::new();
    for task in &plan.tasks {
        let mut node = Node::new(task.id.clone(), task.title.clone())
            .with_estimate(task.estimated_minutes)
            .with_sort_index(task.sort_index);
        node.completed = task.completed;
        graph.add_node(node)?;
    }
    for dep in &plan.dependencies {
        graph.add_edge(&dep.from, &dep.to)?;
    }
    debug!(
        nodes = graph.len(),
        edges = graph.edge_count(),
        "built graph from plan"
    );
    Ok(graph)
}

/// Fold a graph's completion flags and edge set back into the plan.
///
/// Tasks not present in the graph are left untouched; the dependency
/// list is replaced by the graph's current edge set. Timestamps are
/// refreshed on anything that changed.
pub fn apply_graph(plan: &mut Plan, graph: &Graph) {
    let now = Utc::now();
    for task in &mut plan.tasks {
        if let Some(node) = graph.get(&task.id) {
            if task.completed != node.completed {
                task.completed = node.completed;
                task.updated_at = now;
            }
        }
    }
    plan.dependencies = graph
        .edges()
        .map(|(from, to)| PlanDependency {
            from: from.to_string(),
            to: to.to_string(),
        })
        .collect();
    plan.updated_at = now;
}

/// Generate a unique task ID.
///
/// Format: `wp-<4 hex chars>`, hashed from the seed and the current time.
pub fn generate_task_id(seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(
        Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(0)
            .to_le_bytes(),
    );
    let hash_hex = format!("{:x}", hasher.finalize());
    format!("wp-{}", &hash_hex[..4])
}

/// Validate that a task ID matches the expected format.
pub fn validate_task_id(id: &str) -> Result<()> {
    let Some(suffix) = id.strip_prefix("wp-") else {
        return Err(Error::InvalidId(format!(
            "ID must start with 'wp-', got: {id}"
        )));
    };
    if suffix.len() != 4 || !suffix.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidId(format!(
            "ID suffix must be 4 hex characters, got: {suffix}"
        )));
    }
    Ok(())
}
