//! Import cycle detection rooted at a single document

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::graph::DependencyGraph;
use crate::model::{CycleRecord, DocumentId};

/// Finds cycles by DFS over forward edges and remembers the last record per member.
///
/// A record is refreshed only for documents on the cycle found by the most
/// recent search; other members of an older cycle keep their previous record
/// until they are searched from again.
#[derive(Debug, Clone, Default)]
pub struct CycleDetector {
    records: HashMap<DocumentId, CycleRecord>,
}

impl CycleDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard `start`'s record, search from it, and register any cycle found
    /// against each of its members.
    pub fn find_cycle(&mut self, graph: &DependencyGraph, start: &DocumentId) -> Option<CycleRecord> {
        self.records.remove(start);

        let record = search(graph, start).and_then(CycleRecord::from_walk)?;
        debug!("Import cycle found from {}: {}", start, record);
        for member in record.members() {
            self.records.insert(member.clone(), record.clone());
        }
        Some(record)
    }

    pub fn cycle_for(&self, id: &DocumentId) -> Option<&CycleRecord> {
        self.records.get(id)
    }

    /// Each distinct recorded cycle once.
    pub fn all_cycles(&self) -> Vec<CycleRecord> {
        let mut ids: Vec<&DocumentId> = self.records.keys().collect();
        ids.sort();

        let mut distinct: Vec<CycleRecord> = Vec::new();
        for id in ids {
            let record = &self.records[id];
            if !distinct.iter().any(|seen| seen.same_cycle(record)) {
                distinct.push(record.clone());
            }
        }
        distinct
    }

    /// Forget `id` and every record that passes through it.
    pub fn remove(&mut self, id: &DocumentId) -> bool {
        let before = self.records.len();
        self.records.retain(|owner, record| owner != id && !record.contains(id));
        self.records.len() != before
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Iterative DFS. Returns the closed walk of the first back edge met.
fn search(graph: &DependencyGraph, start: &DocumentId) -> Option<Vec<DocumentId>> {
    let mut on_stack: HashSet<DocumentId> = HashSet::new();
    let mut finished: HashSet<DocumentId> = HashSet::new();
    let mut path: Vec<DocumentId> = vec![start.clone()];
    // (node, index of the next edge to follow)
    let mut frames: Vec<(DocumentId, usize)> = vec![(start.clone(), 0)];
    on_stack.insert(start.clone());

    while let Some(frame) = frames.last_mut() {
        let next = graph.edges(&frame.0).get(frame.1).map(|e| e.resolved.clone());
        match next {
            Some(target) => {
                frame.1 += 1;
                let Some(target) = target else {
                    continue;
                };
                if on_stack.contains(&target) {
                    let from = path.iter().position(|id| *id == target)?;
                    let mut walk = path[from..].to_vec();
                    walk.push(target);
                    return Some(walk);
                }
                if finished.contains(&target) {
                    continue;
                }
                on_stack.insert(target.clone());
                path.push(target.clone());
                frames.push((target, 0));
            }
            None => {
                if let Some((done, _)) = frames.pop() {
                    on_stack.remove(&done);
                    path.pop();
                    finished.insert(done);
                }
            }
        }
    }

    None
}
