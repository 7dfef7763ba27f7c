//! Forward and reverse import edges between documents

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::CoreError;
use crate::model::{DocumentId, ImportEdge};

/// The import graph.
///
/// `forward` keeps each importer's edges in source order; `reverse` maps a
/// resolved target to the set of documents importing it. For every resolved
/// edge `(importer, target)`, `reverse[target]` contains `importer`.
/// Cycles are allowed.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    forward: HashMap<DocumentId, Vec<ImportEdge>>,
    reverse: HashMap<DocumentId, HashSet<DocumentId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the importer's whole edge list. Returns true if anything changed.
    pub fn record_imports(&mut self, importer: &DocumentId, edges: Vec<ImportEdge>) -> bool {
        let new_targets: HashSet<DocumentId> =
            edges.iter().filter_map(|e| e.resolved.clone()).collect();

        let old_edges = self.forward.insert(importer.clone(), edges);
        let old_targets: HashSet<DocumentId> = old_edges
            .iter()
            .flatten()
            .filter_map(|e| e.resolved.clone())
            .collect();

        for gone in old_targets.difference(&new_targets) {
            self.unlink(gone, importer);
        }
        for target in &new_targets {
            self.reverse
                .entry(target.clone())
                .or_default()
                .insert(importer.clone());
        }

        match old_edges {
            Some(old) => self.forward.get(importer).is_none_or(|new| *new != old),
            None => true,
        }
    }

    fn unlink(&mut self, target: &DocumentId, importer: &DocumentId) {
        if let Some(importers) = self.reverse.get_mut(target) {
            importers.remove(importer);
            if importers.is_empty() {
                self.reverse.remove(target);
            }
        }
    }

    /// Direct importers of `id`.
    pub fn dependents_of(&self, id: &DocumentId) -> HashSet<DocumentId> {
        self.reverse.get(id).cloned().unwrap_or_default()
    }

    /// Resolved targets of `id`'s imports, in source order, without duplicates.
    pub fn dependencies_of(&self, id: &DocumentId) -> Vec<DocumentId> {
        let mut seen = HashSet::new();
        self.edges(id)
            .iter()
            .filter_map(|e| e.resolved.clone())
            .filter(|target| seen.insert(target.clone()))
            .collect()
    }

    /// The recorded edges of `id`, empty if it was never recorded.
    pub fn edges(&self, id: &DocumentId) -> &[ImportEdge] {
        self.forward.get(id).map_or(&[], Vec::as_slice)
    }

    /// Every document transitively importing any of `seeds`.
    ///
    /// Seeds themselves are only included when reached through an edge,
    /// which happens when they sit on a cycle.
    pub fn transitive_dependents<'a>(
        &self,
        seeds: impl IntoIterator<Item = &'a DocumentId>,
    ) -> HashSet<DocumentId> {
        let mut expanded: HashSet<DocumentId> = HashSet::new();
        let mut affected: HashSet<DocumentId> = HashSet::new();
        let mut queue: VecDeque<DocumentId> = seeds.into_iter().cloned().collect();

        while let Some(current) = queue.pop_front() {
            if !expanded.insert(current.clone()) {
                continue;
            }
            if let Some(importers) = self.reverse.get(&current) {
                for importer in importers {
                    affected.insert(importer.clone());
                    if !expanded.contains(importer) {
                        queue.push_back(importer.clone());
                    }
                }
            }
        }

        affected
    }

    /// Drop `id` from the graph.
    ///
    /// Edges of other documents that resolved to `id` are kept but demoted to
    /// unresolved, so their specifiers can still match a re-created file.
    pub fn remove(&mut self, id: &DocumentId) -> bool {
        let mut removed = false;

        if let Some(edges) = self.forward.remove(id) {
            removed = true;
            for target in edges.iter().filter_map(|e| e.resolved.as_ref()) {
                self.unlink(target, id);
            }
        }

        if let Some(importers) = self.reverse.remove(id) {
            removed = true;
            for importer in importers {
                if let Some(edges) = self.forward.get_mut(&importer) {
                    for edge in edges.iter_mut().filter(|e| e.resolved.as_ref() == Some(id)) {
                        edge.resolved = None;
                    }
                }
            }
        }

        removed
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.forward.contains_key(id) || self.reverse.contains_key(id)
    }

    /// Documents with a recorded edge list.
    pub fn importers(&self) -> impl Iterator<Item = &DocumentId> {
        self.forward.keys()
    }

    /// Number of recorded import edges, resolved or not.
    pub fn edge_count(&self) -> usize {
        self.forward.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }

    /// Verify that the reverse index mirrors the resolved forward edges.
    pub fn check_invariants(&self) -> Result<(), CoreError> {
        for (importer, edges) in &self.forward {
            for target in edges.iter().filter_map(|e| e.resolved.as_ref()) {
                let linked = self
                    .reverse
                    .get(target)
                    .is_some_and(|importers| importers.contains(importer));
                if !linked {
                    return Err(CoreError::GraphInconsistency {
                        reason: format!("{importer} imports {target} but is missing from its dependents"),
                    });
                }
            }
        }

        for (target, importers) in &self.reverse {
            if importers.is_empty() {
                return Err(CoreError::GraphInconsistency {
                    reason: format!("empty dependents entry for {target}"),
                });
            }
            for importer in importers {
                let has_edge = self
                    .edges(importer)
                    .iter()
                    .any(|e| e.resolved.as_ref() == Some(target));
                if !has_edge {
                    return Err(CoreError::GraphInconsistency {
                        reason: format!("{importer} is listed as a dependent of {target} without an edge"),
                    });
                }
            }
        }

        Ok(())
    }

    /// Materialise the resolved edges as a petgraph graph, nodes in id order.
    pub fn to_petgraph(&self) -> DiGraph<DocumentId, String> {
        let mut graph = DiGraph::new();
        let mut nodes: BTreeMap<&DocumentId, NodeIndex> = BTreeMap::new();

        let mut ids: Vec<&DocumentId> = self.forward.keys().chain(self.reverse.keys()).collect();
        ids.sort();
        ids.dedup();
        for id in ids {
            nodes.insert(id, graph.add_node(id.clone()));
        }

        let mut importers: Vec<&DocumentId> = self.forward.keys().collect();
        importers.sort();
        for importer in importers {
            for edge in self.edges(importer) {
                if let Some(target) = &edge.resolved {
                    if let (Some(&from), Some(&to)) = (nodes.get(importer), nodes.get(target)) {
                        graph.add_edge(from, to, edge.specifier.clone());
                    }
                }
            }
        }

        graph
    }
}
