//! Dependency Graph
//!
//! The graph records, for every computed name, which names it read and which
//! names read it. The two directions are kept as a strict inverse pair: `b`
//! is in the dependencies of `a` exactly when `a` is in the dependents of `b`.
//!
//! # Traversals
//!
//! - [`DependencyGraph::downstream`] collects a name and everything that
//!   transitively reads it. Each name is visited once, so diamond-shaped
//!   graphs (and even cyclic edge sets) are walked safely.
//! - [`DependencyGraph::outer_branches`] runs a breadth-first search over the
//!   same edges and keeps only the names nothing reads. Reading those is
//!   enough to recompute every invalidated name in between.

use std::collections::{HashMap, HashSet, VecDeque};

use super::node::Node;

/// Bidirectional dependency edges between names.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Nodes indexed by name. Vacant nodes are never stored.
    nodes: HashMap<String, Node>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    /// Get the node for a name, if it has any edges.
    pub fn get_node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// Dependencies recorded for `name` by its last computation.
    ///
    /// `None` means the name has not been computed since it was last
    /// invalidated.
    pub fn dependencies(&self, name: &str) -> Option<&HashSet<String>> {
        self.nodes.get(name).and_then(Node::dependencies)
    }

    /// Names that currently read `name`.
    pub fn dependents(&self, name: &str) -> impl Iterator<Item = &str> + '_ {
        self.nodes
            .get(name)
            .into_iter()
            .flat_map(|node| node.dependents().iter().map(String::as_str))
    }

    /// Overwrite the dependencies of `name`.
    ///
    /// The old edges are detached first. Passing `None` clears them, leaving
    /// the name with no recorded dependencies at all.
    pub fn set_dependencies(&mut self, name: &str, dependencies: Option<HashSet<String>>) {
        let previous = self
            .nodes
            .get_mut(name)
            .and_then(|node| node.replace_dependencies(None));

        for dependency in previous.iter().flatten() {
            if let Some(node) = self.nodes.get_mut(dependency) {
                node.remove_dependent(name);
            }
            self.prune(dependency);
        }

        if let Some(dependencies) = dependencies {
            for dependency in &dependencies {
                self.nodes
                    .entry(dependency.clone())
                    .or_default()
                    .add_dependent(name);
            }
            self.nodes
                .entry(name.to_string())
                .or_default()
                .replace_dependencies(Some(dependencies));
        }

        self.prune(name);
    }

    /// Collect `root` and every name that transitively reads it.
    ///
    /// Each name appears once, in breadth-first order starting with `root`.
    pub fn downstream(&self, root: &str) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut result = Vec::new();

        queue.push_back(root.to_string());
        while let Some(name) = queue.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }
            queue.extend(self.dependents(&name).map(str::to_string));
            result.push(name);
        }

        result
    }

    /// Find the names reachable from `root` that nothing reads.
    ///
    /// If `root` itself has no dependents it is its own outer branch.
    pub fn outer_branches(&self, root: &str) -> Vec<String> {
        let mut outer = Vec::new();
        let mut seen = HashSet::new();
        let mut frontier = VecDeque::new();

        frontier.push_back(root.to_string());
        while let Some(name) = frontier.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            match self.nodes.get(&name) {
                Some(node) if !node.is_leaf() => {
                    frontier.extend(node.dependents().iter().cloned());
                }
                _ => outer.push(name),
            }
        }

        outer
    }

    /// Drop every edge.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Number of names with at least one recorded edge or dependency set.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Check that both edge directions agree.
    pub fn is_consistent(&self) -> bool {
        let forward = self.nodes.iter().all(|(name, node)| {
            node.dependencies().into_iter().flatten().all(|dependency| {
                self.nodes
                    .get(dependency)
                    .is_some_and(|other| other.dependents().contains(name))
            })
        });
        let backward = self.nodes.iter().all(|(name, node)| {
            node.dependents().iter().all(|dependent| {
                self.dependencies(dependent)
                    .is_some_and(|deps| deps.contains(name))
            })
        });
        forward && backward && self.nodes.values().all(|node| !node.is_vacant())
    }

    fn prune(&mut self, name: &str) {
        if self.nodes.get(name).is_some_and(Node::is_vacant) {
            self.nodes.remove(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    /// a -> (b1, b2) -> c -> (d1, d2) -> e
    fn diamond() -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies("a", Some(HashSet::new()));
        graph.set_dependencies("b1", Some(set(&["a"])));
        graph.set_dependencies("b2", Some(set(&["a"])));
        graph.set_dependencies("c", Some(set(&["b1", "b2"])));
        graph.set_dependencies("d1", Some(set(&["c"])));
        graph.set_dependencies("d2", Some(set(&["c"])));
        graph.set_dependencies("e", Some(set(&["d1", "d2"])));
        graph
    }

    #[test]
    fn edges_are_inverse() {
        let graph = diamond();
        assert!(graph.is_consistent());

        let mut dependents: Vec<_> = graph.dependents("c").collect();
        dependents.sort();
        assert_eq!(dependents, vec!["d1", "d2"]);
        assert_eq!(graph.dependencies("c"), Some(&set(&["b1", "b2"])));
    }

    #[test]
    fn overwriting_detaches_old_edges() {
        let mut graph = diamond();
        graph.set_dependencies("c", Some(set(&["b1"])));

        assert!(graph.is_consistent());
        assert_eq!(graph.dependents("b2").count(), 0);
    }

    #[test]
    fn clearing_removes_vacant_nodes() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies("b", Some(set(&["a"])));
        assert_eq!(graph.node_count(), 2);

        graph.set_dependencies("b", None);
        assert_eq!(graph.node_count(), 0);
        assert!(graph.dependencies("b").is_none());
        assert!(graph.is_consistent());
    }

    #[test]
    fn empty_dependencies_are_recorded() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies("a", Some(HashSet::new()));
        assert_eq!(graph.dependencies("a"), Some(&HashSet::new()));
    }

    #[test]
    fn downstream_visits_each_name_once() {
        let graph = diamond();
        let downstream = graph.downstream("a");

        assert_eq!(downstream.len(), 7);
        assert_eq!(downstream[0], "a");
        assert_eq!(downstream.last().map(String::as_str), Some("e"));
    }

    #[test]
    fn downstream_survives_cycles() {
        let mut graph = DependencyGraph::new();
        graph.set_dependencies("a", Some(set(&["b"])));
        graph.set_dependencies("b", Some(set(&["a"])));

        let mut downstream = graph.downstream("a");
        downstream.sort();
        assert_eq!(downstream, vec!["a", "b"]);
    }

    #[test]
    fn outer_branches_are_leaves() {
        let graph = diamond();
        assert_eq!(graph.outer_branches("a"), vec!["e"]);
        assert_eq!(graph.outer_branches("d1"), vec!["e"]);
        assert_eq!(graph.outer_branches("e"), vec!["e"]);
    }

    #[test]
    fn unknown_root_is_its_own_outer_branch() {
        let graph = DependencyGraph::new();
        assert_eq!(graph.outer_branches("x"), vec!["x"]);
    }
}
