//! Drives documents from disk through the build pipeline

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tether_core::{Document, DocumentId, DocumentState};
use tether_engine::{
    ChangePropagationEngine, ChangeSet, DocumentRegistry, InMemoryRegistry, WorkspaceResolver,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{SourceMatcher, WorkspaceConfig};
use crate::extractor::OutlineExtractor;
use crate::outline::RegexOutline;

/// What a build pass did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildSummary {
    /// Documents brought to `Validated`, in build order.
    pub built: Vec<DocumentId>,
    /// Documents pulled in because something imported them.
    pub discovered: Vec<DocumentId>,
    pub unresolved: BTreeMap<DocumentId, Vec<String>>,
    /// Documents that could not be read or outlined and were left out.
    pub skipped: Vec<DocumentId>,
}

/// Documents to revalidate after a batch of changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevalidationPlan {
    pub changed: Vec<DocumentId>,
    pub affected: Vec<DocumentId>,
}

impl RevalidationPlan {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.affected.is_empty()
    }
}

pub struct Coordinator {
    root: PathBuf,
    config: WorkspaceConfig,
    matcher: SourceMatcher,
    engine: ChangePropagationEngine,
    registry: Arc<InMemoryRegistry>,
    extractor: Box<dyn OutlineExtractor>,
}

impl Coordinator {
    /// Open the workspace at `root` with its `tether.toml`, if any.
    pub fn open(root: &Path) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Workspace root {} does not exist", root.display()))?;
        let config = WorkspaceConfig::load(&root)?;
        Self::with_config(root, config)
    }

    pub fn with_config(root: PathBuf, config: WorkspaceConfig) -> Result<Self> {
        let matcher = config.matcher()?;
        let mut resolver = WorkspaceResolver::new(&root, config.engine.default_extension.clone());
        for (prefix, dir) in &config.aliases {
            resolver = resolver.with_alias(prefix.clone(), dir);
        }
        let registry = Arc::new(InMemoryRegistry::new());
        let engine =
            ChangePropagationEngine::new(config.engine.clone(), Arc::new(resolver), registry.clone());

        Ok(Coordinator {
            root,
            config,
            matcher,
            engine,
            registry,
            extractor: Box::new(RegexOutline::new()?),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn engine(&self) -> &ChangePropagationEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ChangePropagationEngine {
        &mut self.engine
    }

    pub fn registry(&self) -> &InMemoryRegistry {
        &self.registry
    }

    /// Identity of a file under the root. Relative paths are taken from the root.
    pub fn id_for(&self, path: &Path) -> DocumentId {
        if path.is_absolute() {
            DocumentId::from_path(path)
        } else {
            DocumentId::from_path(&self.root.join(path))
        }
    }

    /// Whether `path` is a workspace source by the configured globs.
    pub fn is_source(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.matcher.is_source(relative)
    }

    /// Parse every source file and build them all to `Validated`.
    pub async fn load_workspace(&mut self, cancel: &CancellationToken) -> Result<BuildSummary> {
        self.engine.clear_all();
        self.registry.clear();

        let paths = self.matcher.collect(&self.root);
        info!("Loading {} documents from {:?}", paths.len(), self.root);

        let mut ids = Vec::with_capacity(paths.len());
        let mut skipped = Vec::new();
        for path in paths {
            let id = DocumentId::from_path(&path);
            match self.parse(&id).await {
                Ok(_) => ids.push(id),
                Err(err) => {
                    warn!("Skipping {}: {:#}", id, err);
                    skipped.push(id);
                }
            }
        }

        let mut summary = self.build_to_validated(ids, cancel).await?;
        summary.skipped.extend(skipped);
        summary.skipped.sort();
        Ok(summary)
    }

    /// Read and outline a document, replacing any registered version.
    async fn parse(&self, id: &DocumentId) -> Result<Document> {
        let content = tokio::fs::read(id.as_path())
            .await
            .with_context(|| format!("Failed to read {}", id))?;
        let doc = self.extractor.extract(id, &content)?;
        debug!(
            "Parsed {} ({} imports, {} exports)",
            id,
            doc.imports.len(),
            doc.exports.len()
        );
        self.registry.insert(doc.clone());
        Ok(doc)
    }

    /// Bring `ids` to `Validated`, pulling in any newly discovered import
    /// targets until nothing new turns up.
    pub async fn build_to_validated(
        &mut self,
        ids: Vec<DocumentId>,
        cancel: &CancellationToken,
    ) -> Result<BuildSummary> {
        let mut summary = BuildSummary::default();
        let mut seen: HashSet<DocumentId> = ids.iter().cloned().collect();
        let mut queue: VecDeque<DocumentId> = ids.into();

        while let Some(id) = queue.pop_front() {
            if cancel.is_cancelled() {
                warn!("Build cancelled with {} documents pending", queue.len() + 1);
                anyhow::bail!("build cancelled before {} was validated", id);
            }

            let doc = match self.registry.get(&id) {
                Some(doc) if doc.state >= DocumentState::Parsed => doc,
                _ => {
                    self.registry.get_or_create(&id);
                    match self.parse(&id).await {
                        Ok(doc) => doc,
                        Err(err) => {
                            warn!("Skipping {}: {:#}", id, err);
                            self.registry.remove(&id);
                            summary.skipped.push(id);
                            continue;
                        }
                    }
                }
            };

            let report = self.engine.update_content(&doc, cancel).await?;
            let mut state = DocumentState::IndexedContent;
            self.registry.set_state(&id, state);
            while let Some(next) = state.next() {
                self.registry.set_state(&id, next);
                state = next;
            }

            for target in report.discovered {
                if seen.insert(target.clone()) {
                    debug!("Discovered {} through {}", target, id);
                    summary.discovered.push(target.clone());
                    queue.push_back(target);
                }
            }
            if !report.unresolved.is_empty() {
                summary.unresolved.insert(id.clone(), report.unresolved);
            }
            summary.built.push(id);
        }

        info!(
            "Built {} documents ({} discovered, {} with unresolved imports)",
            summary.built.len(),
            summary.discovered.len(),
            summary.unresolved.len()
        );
        Ok(summary)
    }

    /// Re-read changed files, rebuild them, and work out who must be revalidated.
    pub async fn update_files(
        &mut self,
        paths: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<RevalidationPlan> {
        self.apply_changes(paths, &[], cancel).await
    }

    /// Drop deleted files and work out which importers must be revalidated.
    pub fn remove_files(&mut self, paths: &[PathBuf]) -> RevalidationPlan {
        let ids = self.forget(paths);
        self.plan(ids)
    }

    /// Apply one batch of edits and deletions under a single change set.
    ///
    /// A modified file that cannot be read or outlined keeps its last good
    /// index but is still reported as changed, along with its importers.
    pub async fn apply_changes(
        &mut self,
        modified: &[PathBuf],
        removed: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<RevalidationPlan> {
        let mut changed = self.forget(removed);

        let mut ids = Vec::with_capacity(modified.len());
        for path in modified {
            let id = self.id_for(path);
            match self.parse(&id).await {
                Ok(_) => ids.push(id.clone()),
                Err(err) => warn!("Keeping the last good index of {}: {:#}", id, err),
            }
            changed.push(id);
        }
        self.build_to_validated(ids, cancel).await?;

        Ok(self.plan(changed))
    }

    fn forget(&mut self, paths: &[PathBuf]) -> Vec<DocumentId> {
        let ids: Vec<DocumentId> = paths.iter().map(|path| self.id_for(path)).collect();
        for id in &ids {
            self.engine.remove(id);
            self.registry.remove(id);
        }
        ids
    }

    /// Documents affected by changes to `changed`, without rebuilding anything.
    pub fn plan(&mut self, changed: Vec<DocumentId>) -> RevalidationPlan {
        let set = ChangeSet::new(changed.iter().cloned());
        let affected: Vec<DocumentId> = self
            .registry
            .loaded()
            .into_iter()
            .filter(|id| !set.contains(id))
            .filter(|id| self.engine.is_affected(id, &set))
            .collect();

        let mut changed = changed;
        changed.sort();
        changed.dedup();
        info!(
            "{} changed documents affect {} others",
            changed.len(),
            affected.len()
        );
        RevalidationPlan { changed, affected }
    }
}
