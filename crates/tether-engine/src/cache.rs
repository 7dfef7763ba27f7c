//! One-shot affected-set cache and engine counters

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tether_core::DocumentId;

use crate::change_set::ChangeSet;

/// Single-slot memo from a change-set instance to its transitive affected set.
///
/// Keyed by the set's identity, never its contents. A new change set simply
/// replaces the slot; graph mutations clear it.
#[derive(Debug, Clone, Default)]
pub struct AffectedSetCache {
    slot: Option<(ChangeSet, Arc<HashSet<DocumentId>>)>,
}

impl AffectedSetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached set for exactly this change-set instance.
    pub fn get(&self, key: &ChangeSet) -> Option<Arc<HashSet<DocumentId>>> {
        match &self.slot {
            Some((cached, set)) if cached.id() == key.id() => Some(Arc::clone(set)),
            _ => None,
        }
    }

    pub fn store(&mut self, key: &ChangeSet, set: Arc<HashSet<DocumentId>>) {
        self.slot = Some((key.clone(), set));
    }

    pub fn invalidate(&mut self) {
        self.slot = None;
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    pub(crate) fn peek(&self) -> Option<(&ChangeSet, &HashSet<DocumentId>)> {
        self.slot.as_ref().map(|(key, set)| (key, set.as_ref()))
    }
}

/// Counters for the propagation engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Transitive walks over the reverse graph.
    pub graph_walks: u64,
    /// `is_affected` calls answered from the affected-set cache.
    pub cache_hits: u64,
    /// `is_affected` calls that skipped the walk because no export signature changed.
    pub signature_short_circuits: u64,
    /// Positive answers produced by the rename/move fallback.
    pub fallback_matches: u64,
}
