//! Change propagation over the import graph
//!
//! Owns the dependency graph, export signatures, and cycle records for one
//! workspace. The host drives it one build cycle at a time.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tether_core::{
    CoreError, CycleDetector, CycleRecord, DependencyGraph, Document, DocumentId, ExportSignature,
    ExportSignatureTracker, ImportEdge,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{AffectedSetCache, EngineStats};
use crate::change_set::ChangeSet;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::matching;
use crate::references::{NoReferences, ReferenceIndex};
use crate::registry::DocumentRegistry;
use crate::resolver::{ResolveError, SpecifierResolver};

/// Outcome of one [`ChangePropagationEngine::update_content`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub id: DocumentId,
    pub exports_changed: bool,
    pub edges_changed: bool,
    /// Specifiers left unresolved, in source order.
    pub unresolved: Vec<String>,
    /// Resolved targets the registry does not know yet. The host builds these next.
    pub discovered: Vec<DocumentId>,
    pub cycle: Option<CycleRecord>,
    /// Importers whose resolver cache entries were dropped.
    pub invalidated: Vec<DocumentId>,
}

pub struct ChangePropagationEngine {
    config: EngineConfig,
    resolver: Arc<dyn SpecifierResolver>,
    registry: Arc<dyn DocumentRegistry>,
    references: Box<dyn ReferenceIndex>,
    graph: DependencyGraph,
    exports: ExportSignatureTracker,
    cycles: CycleDetector,
    /// Documents whose most recent update changed their export signature.
    signature_changed: HashSet<DocumentId>,
    affected_cache: AffectedSetCache,
    stats: EngineStats,
}

impl ChangePropagationEngine {
    pub fn new(
        config: EngineConfig,
        resolver: Arc<dyn SpecifierResolver>,
        registry: Arc<dyn DocumentRegistry>,
    ) -> Self {
        ChangePropagationEngine {
            config,
            resolver,
            registry,
            references: Box::new(NoReferences),
            graph: DependencyGraph::new(),
            exports: ExportSignatureTracker::new(),
            cycles: CycleDetector::new(),
            signature_changed: HashSet::new(),
            affected_cache: AffectedSetCache::new(),
            stats: EngineStats::default(),
        }
    }

    /// Consult the host's reference index before any graph work in [`is_affected`](Self::is_affected).
    pub fn with_reference_index(mut self, references: Box<dyn ReferenceIndex>) -> Self {
        self.references = references;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Re-index one document after its content changed.
    ///
    /// Steps run in a fixed order: export diff, edge recording, cycle
    /// detection, then resolver cache invalidation. On cancellation or a
    /// resolver failure nothing is committed: the previous edges and export
    /// signature stay in place until the next successful update.
    pub async fn update_content(
        &mut self,
        doc: &Document,
        cancel: &CancellationToken,
    ) -> Result<UpdateReport, EngineError> {
        let id = &doc.id;

        // The diff is committed together with the edges, so a cancelled or
        // failed update leaves the stored signature and its flag untouched.
        let snapshot = ExportSignatureTracker::snapshot(doc);
        if let Some(previous) = self.exports.get(id) {
            let (added, removed) = previous.delta(&snapshot);
            if !added.is_empty() || !removed.is_empty() {
                debug!("Exports of {} changed: +{:?} -{:?}", id, added, removed);
            }
        }

        let edges = self.resolve_imports(doc, cancel).await?;
        let unresolved: Vec<String> = edges
            .iter()
            .filter(|edge| !edge.is_resolved())
            .map(|edge| edge.specifier.clone())
            .collect();

        let exports_changed = self.exports.diff_and_update(id, snapshot);
        if exports_changed {
            self.signature_changed.insert(id.clone());
        } else {
            self.signature_changed.remove(id);
        }
        self.references.index_content(doc);

        let edges_changed = self.graph.record_imports(id, edges);
        if edges_changed {
            self.affected_cache.invalidate();
        }

        let cycle = self.detect_cycle(id);

        let mut invalidated: Vec<DocumentId> = self.graph.dependents_of(id).into_iter().collect();
        invalidated.push(id.clone());
        invalidated.sort();
        self.resolver.invalidate(&invalidated);

        let discovered: Vec<DocumentId> = self
            .graph
            .dependencies_of(id)
            .into_iter()
            .filter(|target| !self.registry.contains(target))
            .collect();

        info!(
            "Updated {} (exports changed: {}, edges changed: {}, unresolved: {})",
            id,
            exports_changed,
            edges_changed,
            unresolved.len()
        );

        Ok(UpdateReport {
            id: id.clone(),
            exports_changed,
            edges_changed,
            unresolved,
            discovered,
            cycle,
            invalidated,
        })
    }

    async fn resolve_imports(
        &self,
        doc: &Document,
        cancel: &CancellationToken,
    ) -> Result<Vec<ImportEdge>, EngineError> {
        let resolver = Arc::clone(&self.resolver);
        let mut edges = Vec::with_capacity(doc.imports.len());

        for statement in &doc.imports {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Update of {} cancelled while resolving '{}'", doc.id, statement.specifier);
                    return Err(EngineError::Cancelled { id: doc.id.clone() });
                }
                outcome = resolver.resolve(&doc.id, &statement.specifier) => outcome,
            };

            let edge = match outcome {
                Ok(target) => ImportEdge::resolved(statement, target),
                Err(ResolveError::Unresolvable(err)) => {
                    match self.scan_loaded(&doc.id, &statement.specifier) {
                        Some(target) => {
                            debug!(
                                "Resolved '{}' in {} by scanning loaded documents ({})",
                                statement.specifier, doc.id, err
                            );
                            ImportEdge::resolved(statement, target)
                        }
                        None => {
                            debug!("Import left unresolved: {}", err);
                            ImportEdge::unresolved(statement)
                        }
                    }
                }
                Err(source) => {
                    warn!("Resolver failed for '{}' in {}", statement.specifier, doc.id);
                    return Err(EngineError::Resolver {
                        from: doc.id.clone(),
                        specifier: statement.specifier.clone(),
                        source,
                    });
                }
            };
            edges.push(edge);
        }

        Ok(edges)
    }

    /// Best-effort match of a specifier against already-loaded documents by path suffix.
    fn scan_loaded(&self, from: &DocumentId, specifier: &str) -> Option<DocumentId> {
        if !self.config.fallback_scan {
            return None;
        }
        self.registry
            .loaded()
            .into_iter()
            .find(|candidate| candidate != from && matching::specifier_matches(specifier, candidate))
    }

    fn detect_cycle(&mut self, id: &DocumentId) -> Option<CycleRecord> {
        if !self.config.refresh_cycle_members {
            return self.cycles.find_cycle(&self.graph, id);
        }

        let mut members: Vec<DocumentId> = self
            .cycles
            .cycle_for(id)
            .map(|record| record.members().to_vec())
            .unwrap_or_default();
        if let Some(found) = self.cycles.find_cycle(&self.graph, id) {
            members.extend(found.members().iter().cloned());
        }
        members.sort();
        members.dedup();

        for member in members.iter().filter(|member| *member != id) {
            self.cycles.find_cycle(&self.graph, member);
        }
        // Searched last so its own record is the one rooted at it.
        self.cycles.find_cycle(&self.graph, id)
    }

    /// Whether `doc` must be revalidated because the documents in `changed` changed.
    ///
    /// Prefers false positives. The transitive walk only runs when some
    /// changed document altered its export signature, and its result is
    /// cached for the lifetime of `changed`.
    pub fn is_affected(&mut self, doc: &DocumentId, changed: &ChangeSet) -> bool {
        if self.references.references_any(doc, changed) {
            return true;
        }

        if changed.iter().any(|id| self.signature_changed.contains(id)) {
            if self.affected_set(changed).contains(doc) {
                return true;
            }
        } else {
            self.stats.signature_short_circuits += 1;
        }

        if matching::edges_match(self.graph.edges(doc), changed) {
            self.stats.fallback_matches += 1;
            return true;
        }

        false
    }

    /// Every document transitively importing a member of `changed`.
    pub fn all_affected_documents(&mut self, changed: &ChangeSet) -> HashSet<DocumentId> {
        self.affected_set(changed).as_ref().clone()
    }

    fn affected_set(&mut self, changed: &ChangeSet) -> Arc<HashSet<DocumentId>> {
        if let Some(set) = self.affected_cache.get(changed) {
            self.stats.cache_hits += 1;
            return set;
        }
        self.stats.graph_walks += 1;
        let set = Arc::new(self.graph.transitive_dependents(changed.iter()));
        self.affected_cache.store(changed, Arc::clone(&set));
        set
    }

    /// Direct importers of `id`.
    pub fn dependents_of(&self, id: &DocumentId) -> HashSet<DocumentId> {
        self.graph.dependents_of(id)
    }

    pub fn dependencies_of(&self, id: &DocumentId) -> Vec<DocumentId> {
        self.graph.dependencies_of(id)
    }

    /// Resolved import targets of `id`, in source order.
    pub fn resolved_imports(&self, id: &DocumentId) -> Vec<DocumentId> {
        self.graph.dependencies_of(id)
    }

    /// Every recorded import of `id`, with its alias and resolution.
    pub fn import_info(&self, id: &DocumentId) -> &[ImportEdge] {
        self.graph.edges(id)
    }

    pub fn unresolved_imports(&self, id: &DocumentId) -> Vec<&ImportEdge> {
        self.graph.edges(id).iter().filter(|edge| !edge.is_resolved()).collect()
    }

    pub fn cycle_for(&self, id: &DocumentId) -> Option<&CycleRecord> {
        self.cycles.cycle_for(id)
    }

    pub fn all_cycles(&self) -> Vec<CycleRecord> {
        self.cycles.all_cycles()
    }

    pub fn export_signature(&self, id: &DocumentId) -> Option<&ExportSignature> {
        self.exports.get(id)
    }

    /// Documents that went through `update_content`, sorted.
    pub fn documents(&self) -> Vec<DocumentId> {
        let mut ids: Vec<DocumentId> = self.graph.importers().cloned().collect();
        ids.sort();
        ids
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Check the graph's reverse index and the cached affected set against a fresh walk.
    pub fn verify(&self) -> Result<(), EngineError> {
        self.graph.check_invariants()?;

        if let Some((key, cached)) = self.affected_cache.peek() {
            let fresh = self.graph.transitive_dependents(key.iter());
            if fresh != *cached {
                return Err(CoreError::GraphInconsistency {
                    reason: format!(
                        "cached affected set holds {} documents, graph yields {}",
                        cached.len(),
                        fresh.len()
                    ),
                }
                .into());
            }
        }

        if let Some(stray) = self
            .signature_changed
            .iter()
            .find(|id| self.exports.get(id).is_none())
        {
            return Err(CoreError::GraphInconsistency {
                reason: format!("{stray} is marked as changed without an export signature"),
            }
            .into());
        }

        Ok(())
    }

    /// Forget `id` everywhere. Returns false if it was unknown.
    pub fn remove(&mut self, id: &DocumentId) -> bool {
        let mut scope: Vec<DocumentId> = self.graph.dependents_of(id).into_iter().collect();
        scope.push(id.clone());

        let mut removed = self.graph.remove(id);
        removed |= self.exports.remove(id).is_some();
        removed |= self.cycles.remove(id);
        removed |= self.signature_changed.remove(id);
        self.references.remove(id);
        self.affected_cache.invalidate();
        self.resolver.invalidate(&scope);

        if removed {
            info!("Removed {} from the import graph", id);
        }
        removed
    }

    /// Drop all workspace state, counters included.
    pub fn clear_all(&mut self) {
        self.graph.clear();
        self.exports.clear();
        self.cycles.clear();
        self.signature_changed.clear();
        self.references.clear();
        self.affected_cache.invalidate();
        self.stats = EngineStats::default();
        self.resolver.clear();
        info!("Cleared all change propagation state");
    }
}
