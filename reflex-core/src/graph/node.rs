//! Graph Nodes
//!
//! This module defines the per-name record kept by the dependency graph.

use std::collections::HashSet;

/// Edges recorded for one name.
///
/// `dependencies` is `None` until the name has been computed and again after
/// it is invalidated, so a node can tell "never computed" apart from
/// "computed and read nothing".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    /// Names this node read during its last computation.
    dependencies: Option<HashSet<String>>,

    /// Names whose last computation read this node.
    dependents: HashSet<String>,
}

impl Node {
    /// Create a node with no recorded edges.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dependencies recorded by the last computation, if any.
    pub fn dependencies(&self) -> Option<&HashSet<String>> {
        self.dependencies.as_ref()
    }

    /// Replace the recorded dependencies, returning the previous set.
    pub fn replace_dependencies(
        &mut self,
        dependencies: Option<HashSet<String>>,
    ) -> Option<HashSet<String>> {
        std::mem::replace(&mut self.dependencies, dependencies)
    }

    /// Names that read this node.
    pub fn dependents(&self) -> &HashSet<String> {
        &self.dependents
    }

    /// Add a dependent (a name that reads this node).
    pub fn add_dependent(&mut self, name: &str) {
        if !self.dependents.contains(name) {
            self.dependents.insert(name.to_string());
        }
    }

    /// Remove a dependent.
    pub fn remove_dependent(&mut self, name: &str) {
        self.dependents.remove(name);
    }

    /// True if nothing currently reads this node.
    pub fn is_leaf(&self) -> bool {
        self.dependents.is_empty()
    }

    /// True if the node carries no information and can be dropped.
    pub fn is_vacant(&self) -> bool {
        self.dependencies.is_none() && self.dependents.is_empty()
    }
}
