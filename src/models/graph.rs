//! The dependency graph engine.
//!
//! A `Graph` owns a set of nodes and a set of directed edges
//! `(prerequisite, dependent)` and guarantees the pair always forms a DAG.
//! All structural change goes through the checked mutation methods here;
//! the backing collections are private so the acyclicity invariant cannot
//! be bypassed.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use tracing::debug;

use super::{GraphStats, Node};

/// Structural problems reported by mutation and validation operations.
///
/// These are recoverable conditions surfaced to the caller, never
/// silently corrected and never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// An edge referenced a node not present in the graph.
    #[error("unknown node: {id}")]
    UnknownNode { id: String },

    /// An edge's endpoints were identical.
    #[error("node '{id}' cannot depend on itself")]
    SelfLoop { id: String },

    /// Inserting the requested edge would close a cycle. `path` is the
    /// concrete cycle found, starting and ending at the same node.
    #[error("cycle detected: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    /// A node was added with an ID already present in the graph.
    #[error("duplicate node ID: {id}")]
    DuplicateNode { id: String },
}

/// A directed acyclic graph of work items.
///
/// Edges are ordered pairs `(from, to)` meaning `from` must be satisfied
/// before `to`: `from` is a prerequisite of `to`, `to` a dependent of
/// `from`. [`Graph::add_edge`] is the only way the edge set grows, so the
/// graph stays acyclic after every successful call.
///
/// The engine is synchronous and does no I/O. Queries are side-effect
/// free; callers wanting snapshot semantics can `clone()` before
/// mutating.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// All nodes, keyed by ID
    nodes: HashMap<String, Node>,

    /// Node IDs in insertion order, for deterministic iteration
    insertion_order: Vec<String>,

    /// Forward adjacency: prerequisite -> dependents, in edge insertion order
    edges_out: HashMap<String, Vec<String>>,

    /// Reverse adjacency: dependent -> prerequisites, in edge insertion order
    edges_in: HashMap<String, Vec<String>>,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns true if a node with this ID exists.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Get a node by ID.
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Iterate over all nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.insertion_order
            .iter()
            .filter_map(|id| self.nodes.get(id))
    }

    /// Iterate over all edges as `(from, to)` pairs, in deterministic
    /// order (node insertion order, then edge insertion order).
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.insertion_order.iter().flat_map(|from| {
            self.successors_of(from)
                .iter()
                .map(move |to| (from.as_str(), to.as_str()))
        })
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges_out.values().map(Vec::len).sum()
    }

    // === Mutation Operations ===

    /// Add a node to the graph.
    ///
    /// Returns `DuplicateNode` if a node with the same ID already exists;
    /// the graph is unchanged in that case.
    pub fn add_node(&mut self, node: Node) -> Result<(), ValidationError> {
        if self.nodes.contains_key(&node.id) {
            return Err(ValidationError::DuplicateNode {
                id: node.id.clone(),
            });
        }
        self.insertion_order.push(node.id.clone());
        self.edges_out.entry(node.id.clone()).or_default();
        self.edges_in.entry(node.id.clone()).or_default();
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Remove a node and every edge incident to it.
    ///
    /// No-op if the ID does not exist.
    pub fn remove_node(&mut self, id: &str) {
        if self.nodes.remove(id).is_none() {
            return;
        }
        self.insertion_order.retain(|n| n != id);
        for to in self.edges_out.remove(id).unwrap_or_default() {
            if let Some(preds) = self.edges_in.get_mut(&to) {
                preds.retain(|f| f != id);
            }
        }
        for from in self.edges_in.remove(id).unwrap_or_default() {
            if let Some(succs) = self.edges_out.get_mut(&from) {
                succs.retain(|t| t != id);
            }
        }
    }

    /// Add a dependency edge: `from` must be satisfied before `to`.
    ///
    /// Returns an error if:
    /// - Either ID names no node in the graph (`UnknownNode`)
    /// - Both endpoints are the same node (`SelfLoop`)
    /// - The edge would close a cycle (`CycleDetected`, carrying the
    ///   concrete conflicting chain)
    ///
    /// Adding an edge that already exists is a successful no-op. On any
    /// error the edge set is left unchanged.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), ValidationError> {
        if !self.nodes.contains_key(from) {
            return Err(ValidationError::UnknownNode {
                id: from.to_string(),
            });
        }
        if !self.nodes.contains_key(to) {
            return Err(ValidationError::UnknownNode { id: to.to_string() });
        }
        if from == to {
            return Err(ValidationError::SelfLoop {
                id: from.to_string(),
            });
        }
        if self.successors_of(from).iter().any(|t| t == to) {
            return Ok(());
        }

        // Would `from -> to` close a cycle? It does exactly when `to`
        // already reaches `from` through existing edges.
        if let Some(existing) = self.path_between(to, from) {
            let mut path = Vec::with_capacity(existing.len() + 1);
            path.push(from.to_string());
            path.extend(existing);
            debug!(from, to, "rejected edge: would close a cycle");
            return Err(ValidationError::CycleDetected { path });
        }

        self.edges_out
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
        self.edges_in
            .entry(to.to_string())
            .or_default()
            .push(from.to_string());
        Ok(())
    }

    /// Remove the edge `from -> to` if present.
    ///
    /// No-op if the edge (or either node) does not exist. Removing edges
    /// cannot introduce a cycle, so this never fails.
    pub fn remove_edge(&mut self, from: &str, to: &str) {
        if let Some(succs) = self.edges_out.get_mut(from) {
            succs.retain(|t| t != to);
        }
        if let Some(preds) = self.edges_in.get_mut(to) {
            preds.retain(|f| f != from);
        }
    }

    /// Remove every edge, keeping all nodes.
    pub fn remove_all_edges(&mut self) {
        for succs in self.edges_out.values_mut() {
            succs.clear();
        }
        for preds in self.edges_in.values_mut() {
            preds.clear();
        }
    }

    /// Remove all nodes and edges.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.insertion_order.clear();
        self.edges_out.clear();
        self.edges_in.clear();
    }

    /// Mark a node completed. No-op if the ID does not exist.
    ///
    /// No cascade and no check against prerequisite completion: marking a
    /// still-blocked node complete is permitted, any stricter policy
    /// belongs to the caller.
    pub fn mark_completed(&mut self, id: &str) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.completed = true;
        }
    }

    /// Mark a node incomplete. No-op if the ID does not exist.
    pub fn mark_incomplete(&mut self, id: &str) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.completed = false;
        }
    }

    // === Query Operations ===

    /// Get the direct prerequisites of a node (nodes with an edge into
    /// it). Not the transitive closure.
    pub fn get_prerequisites(&self, id: &str) -> Vec<&Node> {
        self.predecessors_of(id)
            .iter()
            .filter_map(|p| self.nodes.get(p))
            .collect()
    }

    /// Get the direct dependents of a node (nodes with an edge out of it).
    pub fn get_dependents(&self, id: &str) -> Vec<&Node> {
        self.successors_of(id)
            .iter()
            .filter_map(|s| self.nodes.get(s))
            .collect()
    }

    /// Get every transitive prerequisite of a node, in depth-first
    /// discovery order. The node itself is not included.
    pub fn transitive_prerequisites(&self, id: &str) -> Vec<&Node> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = Vec::new();
        let mut found = Vec::new();

        for pred in self.predecessors_of(id).iter().rev() {
            stack.push(pred);
        }
        while let Some(current) = stack.pop() {
            if current == id || !visited.insert(current) {
                continue;
            }
            if let Some(node) = self.nodes.get(current) {
                found.push(node);
            }
            for pred in self.predecessors_of(current).iter().rev() {
                if !visited.contains(pred.as_str()) {
                    stack.push(pred);
                }
            }
        }
        found
    }

    /// Returns true if at least one direct prerequisite of the node is
    /// incomplete.
    ///
    /// This is a local, non-transitive test: the engine trusts completion
    /// flags at face value and does not walk the ancestor chain.
    pub fn is_blocked(&self, id: &str) -> bool {
        self.predecessors_of(id)
            .iter()
            .any(|p| self.nodes.get(p).is_some_and(|n| !n.completed))
    }

    /// Incomplete nodes whose direct prerequisites are all complete, in
    /// insertion order. These are the nodes currently workable.
    pub fn ready_nodes(&self) -> Vec<&Node> {
        self.nodes()
            .filter(|n| !n.completed && !self.is_blocked(&n.id))
            .collect()
    }

    /// Incomplete nodes with at least one incomplete direct prerequisite,
    /// in insertion order.
    pub fn blocked_nodes(&self) -> Vec<&Node> {
        self.nodes()
            .filter(|n| !n.completed && self.is_blocked(&n.id))
            .collect()
    }

    /// Return the nodes in topological order, or `None` if a cycle is
    /// present.
    ///
    /// Kahn's algorithm. Among nodes whose in-degree has reached zero the
    /// next one emitted is the minimum of `(sort_index, insertion
    /// position)`, so output is fully deterministic.
    ///
    /// `add_edge` rejects cycles, so `None` can only mean the invariant
    /// was broken some other way; this doubles as a consistency check.
    pub fn topological_sort(&self) -> Option<Vec<&Node>> {
        let position: HashMap<&str, usize> = self
            .insertion_order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut in_degree: HashMap<&str, usize> = self
            .insertion_order
            .iter()
            .map(|id| (id.as_str(), self.predecessors_of(id).len()))
            .collect();

        let mut ready: BinaryHeap<Reverse<(i64, usize)>> = BinaryHeap::new();
        for (pos, id) in self.insertion_order.iter().enumerate() {
            if in_degree.get(id.as_str()) == Some(&0) {
                let sort_index = self.nodes[id.as_str()].sort_index;
                ready.push(Reverse((sort_index, pos)));
            }
        }

        let mut result = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse((_, pos))) = ready.pop() {
            let id = &self.insertion_order[pos];
            result.push(&self.nodes[id.as_str()]);

            for succ in self.successors_of(id) {
                if let Some(degree) = in_degree.get_mut(succ.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        let sort_index = self.nodes[succ.as_str()].sort_index;
                        ready.push(Reverse((sort_index, position[succ.as_str()])));
                    }
                }
            }
        }

        if result.len() == self.nodes.len() {
            Some(result)
        } else {
            None
        }
    }

    /// Returns true if the graph contains a cycle.
    pub fn has_cycle(&self) -> bool {
        self.find_cycle().is_some()
    }

    /// Find a concrete cycle if one exists, as a node ID sequence that
    /// starts and ends at the same node.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        self.collect_cycles().into_iter().next()
    }

    /// Re-scan the whole node/edge set and report every structural
    /// problem found, independent of the incremental `add_edge`
    /// bookkeeping.
    ///
    /// Reports an `UnknownNode` for each edge endpoint missing from the
    /// node set and a `CycleDetected` witness for each back edge found in
    /// a full cycle search. Diagnostic only: nothing is repaired.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut problems = Vec::new();

        for (from, succs) in self.ordered_adjacency() {
            if !self.nodes.contains_key(from) {
                problems.push(ValidationError::UnknownNode {
                    id: from.to_string(),
                });
            }
            for to in succs {
                if !self.nodes.contains_key(to.as_str()) {
                    problems.push(ValidationError::UnknownNode { id: to.clone() });
                }
            }
        }

        for path in self.collect_cycles() {
            problems.push(ValidationError::CycleDetected { path });
        }

        if !problems.is_empty() {
            debug!(count = problems.len(), "graph validation found problems");
        }
        problems
    }

    /// Weakly connected components of the graph, as groups of node IDs.
    ///
    /// Both groups and members are in node insertion order. Isolated
    /// nodes form singleton components.
    pub fn components(&self) -> Vec<Vec<String>> {
        let mut uf = UnionFind::new();
        for id in &self.insertion_order {
            uf.make_set(id.clone());
        }
        for (from, to) in self.edges() {
            uf.union(from, to);
        }

        let mut groups: Vec<Vec<String>> = Vec::new();
        let mut root_index: HashMap<String, usize> = HashMap::new();
        for id in &self.insertion_order {
            let Some(root) = uf.find(id) else { continue };
            match root_index.get(&root) {
                Some(&i) => groups[i].push(id.clone()),
                None => {
                    root_index.insert(root, groups.len());
                    groups.push(vec![id.clone()]);
                }
            }
        }
        groups
    }

    /// Compute progress statistics for the current graph state.
    ///
    /// Derived fresh on every call, never cached.
    pub fn statistics(&self) -> GraphStats {
        let total_nodes = self.nodes.len();
        let completed_nodes = self.nodes.values().filter(|n| n.completed).count();
        let total_edges = self.edge_count();
        let root_count = self
            .insertion_order
            .iter()
            .filter(|id| self.predecessors_of(id.as_str()).is_empty())
            .count();
        let leaf_count = self
            .insertion_order
            .iter()
            .filter(|id| self.successors_of(id.as_str()).is_empty())
            .count();

        GraphStats::new(
            total_nodes,
            completed_nodes,
            total_edges,
            root_count,
            leaf_count,
            self.longest_path_len(),
            self.components().len(),
        )
    }

    // === Internals ===

    fn successors_of(&self, id: &str) -> &[String] {
        self.edges_out.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn predecessors_of(&self, id: &str) -> &[String] {
        self.edges_in.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Adjacency entries in node insertion order, then any entries for
    /// IDs no longer in the node set (possible only if the invariant was
    /// bypassed; `validate` wants to see those too).
    fn ordered_adjacency(&self) -> Vec<(&str, &Vec<String>)> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut entries: Vec<(&str, &Vec<String>)> = Vec::new();
        for id in &self.insertion_order {
            if let Some(succs) = self.edges_out.get(id) {
                seen.insert(id.as_str());
                entries.push((id.as_str(), succs));
            }
        }
        for (id, succs) in &self.edges_out {
            if !seen.contains(id.as_str()) {
                entries.push((id.as_str(), succs));
            }
        }
        entries
    }

    /// Shortest path from `start` to `target` through existing edges,
    /// inclusive of both endpoints. BFS over insertion-ordered adjacency,
    /// so the result is deterministic.
    fn path_between(&self, start: &str, target: &str) -> Option<Vec<String>> {
        let mut parents: HashMap<&str, &str> = HashMap::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for next in self.successors_of(current) {
                if !visited.insert(next.as_str()) {
                    continue;
                }
                parents.insert(next, current);
                if next == target {
                    let mut path = vec![target.to_string()];
                    let mut cursor = target;
                    while cursor != start {
                        cursor = parents[cursor];
                        path.push(cursor.to_string());
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
        None
    }

    /// Full cycle search: iterative three-color DFS over every node,
    /// recording one witness path per back edge found.
    fn collect_cycles(&self) -> Vec<Vec<String>> {
        let mut cycles = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();

        for start in &self.insertion_order {
            if visited.contains(start.as_str()) {
                continue;
            }
            let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];
            let mut on_stack: HashSet<&str> = HashSet::new();
            visited.insert(start);
            on_stack.insert(start);

            while let Some(&(node, next_idx)) = stack.last() {
                let succs = self.successors_of(node);
                if next_idx < succs.len() {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                    let next = succs[next_idx].as_str();
                    if on_stack.contains(next) {
                        // Back edge: the cycle is the stack suffix from
                        // `next` down to `node`, closed by this edge.
                        let pos = stack.iter().position(|(n, _)| *n == next);
                        if let Some(pos) = pos {
                            let mut cycle: Vec<String> =
                                stack[pos..].iter().map(|(n, _)| n.to_string()).collect();
                            cycle.push(next.to_string());
                            cycles.push(cycle);
                        }
                    } else if visited.insert(next) {
                        on_stack.insert(next);
                        stack.push((next, 0));
                    }
                } else {
                    on_stack.remove(node);
                    stack.pop();
                }
            }
        }
        cycles
    }

    /// Length in nodes of the longest directed path: DP over a
    /// topological order. Zero for an empty graph, and zero if the sort
    /// fails (cycle), where the length is undefined.
    fn longest_path_len(&self) -> usize {
        let Some(order) = self.topological_sort() else {
            debug!("longest path undefined: graph contains a cycle");
            return 0;
        };
        let mut longest: HashMap<&str, usize> = HashMap::new();
        for node in order {
            let best_pred = self
                .predecessors_of(&node.id)
                .iter()
                .filter_map(|p| longest.get(p.as_str()))
                .copied()
                .max()
                .unwrap_or(0);
            longest.insert(node.id.as_str(), best_pred + 1);
        }
        longest.values().copied().max().unwrap_or(0)
    }

    /// Test-only escape hatch that bypasses the cycle check, to exercise
    /// the defensive paths (`validate`, `topological_sort` on a broken
    /// graph).
    #[cfg(test)]
    fn insert_edge_unchecked(&mut self, from: &str, to: &str) {
        self.edges_out
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
        self.edges_in
            .entry(to.to_string())
            .or_default()
            .push(from.to_string());
    }
}

/// Union-Find (Disjoint Set Union) over node IDs, used for component
/// detection. Path compression and union by rank.
#[derive(Debug, Clone, Default)]
struct UnionFind {
    parent: HashMap<String, String>,
    rank: HashMap<String, usize>,
}

impl UnionFind {
    fn new() -> Self {
        Self::default()
    }

    /// Add an element as its own singleton set. No-op if already present.
    fn make_set(&mut self, x: String) {
        if !self.parent.contains_key(&x) {
            self.parent.insert(x.clone(), x.clone());
            self.rank.insert(x, 0);
        }
    }

    /// Find the representative of the set containing `x`, compressing the
    /// path on the way. Returns `None` for unknown elements.
    fn find(&mut self, x: &str) -> Option<String> {
        self.parent.get(x)?;

        let mut root = x.to_string();
        while self.parent[&root] != root {
            root = self.parent[&root].clone();
        }

        // Second pass: point everything on the walked path at the root.
        let mut cursor = x.to_string();
        while cursor != root {
            let next = self.parent[&cursor].clone();
            self.parent.insert(cursor, root.clone());
            cursor = next;
        }
        Some(root)
    }

    /// Merge the sets containing `x` and `y`. Returns false if they were
    /// already merged or either element is unknown.
    fn union(&mut self, x: &str, y: &str) -> bool {
        let (Some(root_x), Some(root_y)) = (self.find(x), self.find(y)) else {
            return false;
        };
        if root_x == root_y {
            return false;
        }

        let rank_x = self.rank.get(&root_x).copied().unwrap_or(0);
        let rank_y = self.rank.get(&root_y).copied().unwrap_or(0);
        if rank_x < rank_y {
            self.parent.insert(root_x, root_y);
        } else if rank_x > rank_y {
            self.parent.insert(root_y, root_x);
        } else {
            self.parent.insert(root_y, root_x.clone());
            self.rank.insert(root_x, rank_x + 1);
        }
        true
    }
}
