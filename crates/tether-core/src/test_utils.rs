//! Test utilities for building import graphs

use crate::graph::DependencyGraph;
use crate::model::{DocumentId, ImportEdge, ImportStatement};

/// Workspace-style identifier for a short document name: `leaf` -> `/ws/leaf.x`.
pub fn doc(name: &str) -> DocumentId {
    DocumentId::new(format!("/ws/{}.x", name))
}

/// A resolved edge whose specifier is the target's short name.
pub fn edge_to(name: &str) -> ImportEdge {
    ImportEdge::resolved(&ImportStatement::new(name), doc(name))
}

/// An edge that failed to resolve.
pub fn dangling(specifier: &str) -> ImportEdge {
    ImportEdge::unresolved(&ImportStatement::new(specifier))
}

/// Build a graph from `(importer, [imported...])` pairs of short names.
pub fn graph_of(structure: &[(&str, &[&str])]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for (importer, targets) in structure {
        let edges = targets.iter().map(|t| edge_to(t)).collect();
        graph.record_imports(&doc(importer), edges);
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_of_records_every_importer() {
        let graph = graph_of(&[("a", &["b", "c"]), ("b", &["c"])]);

        assert_eq!(graph.edges(&doc("a")).len(), 2);
        assert_eq!(graph.edges(&doc("b")).len(), 1);
        assert!(graph.edges(&doc("c")).is_empty());
    }
}
