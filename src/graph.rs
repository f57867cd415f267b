//! Work order dependency graph.
//!
//! Builds a directed graph whose edges point from prerequisite to
//! dependent, validates references, and produces a deterministic linear
//! order or a cycle witness.
//!
//! # Determinism
//!
//! Kahn's algorithm detects cycles as a natural consequence of
//! termination and runs in O(V + E). The ready pool is drained in
//! `(original_start, id)` order, so the resulting schedule is
//! reproducible across runs regardless of map iteration order.
//!
//! # Reference
//! Kahn (1962), "Topological sorting of large networks", CACM 5(11)

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use crate::error::SchedulerError;
use crate::models::WorkOrder;

/// A node in the dependency graph.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// The underlying work order.
    pub order: WorkOrder,
    /// Declared prerequisites, deduplicated, in declaration order.
    pub dependencies: Vec<String>,
    /// Orders that declared this node as a prerequisite, in input order.
    pub dependents: Vec<String>,
    /// Number of distinct prerequisites.
    pub in_degree: usize,
}

/// Directed dependency graph over a set of work orders.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: HashMap<String, GraphNode>,
    /// Node ids in input order; all iteration starts here, never from the map.
    ids: Vec<String>,
}

impl DependencyGraph {
    /// Builds the graph in two passes: one node per order, then reverse
    /// edges with reference validation.
    ///
    /// Dependency lists are treated as sets; duplicate declarations are
    /// dropped.
    ///
    /// # Errors
    /// [`SchedulerError::MissingDependency`] when an order references an
    /// unknown order id.
    pub fn build(orders: &[WorkOrder]) -> Result<Self, SchedulerError> {
        let mut nodes: HashMap<String, GraphNode> = HashMap::with_capacity(orders.len());
        let mut ids = Vec::with_capacity(orders.len());

        for order in orders {
            let mut seen = HashSet::new();
            let dependencies: Vec<String> = order
                .depends_on
                .iter()
                .filter(|d| seen.insert(d.as_str()))
                .cloned()
                .collect();
            let in_degree = dependencies.len();
            let node = GraphNode {
                order: order.clone(),
                dependencies,
                dependents: Vec::new(),
                in_degree,
            };
            if nodes.insert(order.id.clone(), node).is_none() {
                ids.push(order.id.clone());
            }
        }

        for id in &ids {
            let dependencies = nodes
                .get(id)
                .map(|n| n.dependencies.clone())
                .unwrap_or_default();
            for dep in dependencies {
                match nodes.get_mut(&dep) {
                    Some(prerequisite) => prerequisite.dependents.push(id.clone()),
                    None => {
                        return Err(SchedulerError::MissingDependency {
                            work_order_id: id.clone(),
                            missing_dependency_id: dep,
                        })
                    }
                }
            }
        }

        Ok(Self { nodes, ids })
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up a node by order id.
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Kahn's algorithm with a deterministic ready pool.
    ///
    /// The pool always yields the node with the smallest
    /// `(original_start, id)` key.
    ///
    /// # Errors
    /// [`SchedulerError::CircularDependency`] with a cycle witness when
    /// the graph cannot be drained.
    pub fn topological_sort(&self) -> Result<Vec<&WorkOrder>, SchedulerError> {
        let mut in_degree: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|(id, node)| (id.as_str(), node.in_degree))
            .collect();

        let mut ready = BinaryHeap::new();
        for id in &self.ids {
            if let Some(node) = self.nodes.get(id) {
                if node.in_degree == 0 {
                    ready.push(Reverse((node.order.original_start, id.as_str())));
                }
            }
        }

        let mut sorted = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse((_, id))) = ready.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            sorted.push(&node.order);
            for dependent in &node.dependents {
                if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        if let Some(next) = self.nodes.get(dependent) {
                            ready.push(Reverse((next.order.original_start, dependent.as_str())));
                        }
                    }
                }
            }
        }

        if sorted.len() == self.nodes.len() {
            Ok(sorted)
        } else {
            let remaining: HashSet<&str> = in_degree
                .iter()
                .filter(|(_, &degree)| degree > 0)
                .map(|(&id, _)| id)
                .collect();
            Err(SchedulerError::CircularDependency {
                cycle: self.find_cycle(&remaining),
            })
        }
    }

    /// All orders that transitively depend on `id` (not including `id`),
    /// sorted. Auxiliary; not used by the scheduling pass.
    pub fn transitive_dependents(&self, id: &str) -> Vec<String> {
        self.closure(id, |node| &node.dependents)
    }

    /// All transitive prerequisites of `id` (not including `id`), sorted.
    /// Auxiliary; not used by the scheduling pass.
    pub fn transitive_dependencies(&self, id: &str) -> Vec<String> {
        self.closure(id, |node| &node.dependencies)
    }

    fn closure<'a, F>(&'a self, id: &str, edges: F) -> Vec<String>
    where
        F: Fn(&'a GraphNode) -> &'a Vec<String>,
    {
        let mut reached: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        if let Some(start) = self.nodes.get(id) {
            for next in edges(start) {
                queue.push_back(next);
            }
        }
        while let Some(current) = queue.pop_front() {
            if !reached.insert(current) {
                continue;
            }
            if let Some(node) = self.nodes.get(current) {
                for next in edges(node) {
                    if !reached.contains(next.as_str()) {
                        queue.push_back(next);
                    }
                }
            }
        }
        let mut out: Vec<String> = reached.into_iter().map(str::to_string).collect();
        out.sort_unstable();
        out
    }

    /// Depth-first search over the `remaining` set, following the
    /// prerequisite direction, returning a cycle witness that
    /// re-encounters its first id.
    fn find_cycle(&self, remaining: &HashSet<&str>) -> Vec<String> {
        let mut starts: Vec<&str> = remaining.iter().copied().collect();
        starts.sort_unstable();

        let mut visited: HashSet<&str> = HashSet::new();
        for start in starts {
            if visited.contains(start) {
                continue;
            }
            let mut path = Vec::new();
            let mut on_path = HashSet::new();
            if let Some(cycle) =
                self.dfs_cycle(start, remaining, &mut visited, &mut path, &mut on_path)
            {
                return cycle;
            }
        }
        Vec::new()
    }

    fn dfs_cycle<'a>(
        &'a self,
        node: &'a str,
        remaining: &HashSet<&str>,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
        on_path: &mut HashSet<&'a str>,
    ) -> Option<Vec<String>> {
        visited.insert(node);
        path.push(node);
        on_path.insert(node);

        if let Some(current) = self.nodes.get(node) {
            for dep in &current.dependencies {
                if !remaining.contains(dep.as_str()) {
                    continue;
                }
                if on_path.contains(dep.as_str()) {
                    let first = path.iter().position(|&p| p == dep).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[first..].iter().map(|s| s.to_string()).collect();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
                if !visited.contains(dep.as_str()) {
                    if let Some(cycle) =
                        self.dfs_cycle(dep, remaining, visited, path, on_path)
                    {
                        return Some(cycle);
                    }
                }
            }
        }

        path.pop();
        on_path.remove(node);
        None
    }
}
