//! Dependency Graph
//!
//! This module tracks relationships between named values in a namespace.
//!
//! # Overview
//!
//! - Nodes are names. A node exists only while it has recorded edges.
//! - Edges are re-derived on every computation: if `c` read `a` and `b` the
//!   last time it was computed, the graph holds `c -> a` and `c -> b` in the
//!   dependency direction and `a -> c`, `b -> c` in the dependent direction.
//!
//! When a name is written, the graph is walked in the dependent direction to
//! find every cached value that may be stale. Computation results never flow
//! through the graph; it only answers "who read whom".
//!
//! The graph is not required to be acyclic. Cycles between names cannot be
//! computed (evaluation hits the recursion limit first and records nothing),
//! but all traversals here use visited sets and terminate regardless.

mod dependency;
mod node;

pub use dependency::DependencyGraph;
pub use node::Node;
