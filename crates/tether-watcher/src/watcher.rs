//! Filesystem watcher implementation

use anyhow::Result;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tether_indexer::{Coordinator, RevalidationPlan};
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Events emitted by the file watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// File or directory created
    Created(PathBuf),
    /// File or directory modified
    Modified(PathBuf),
    /// File or directory removed
    Removed(PathBuf),
}

/// File system watcher for monitoring workspace sources
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
    watched_paths: HashSet<PathBuf>,
    root_path: PathBuf,
}

impl FileWatcher {
    /// Create a new file watcher for the given root path
    pub fn new(root_path: impl AsRef<Path>) -> Result<Self> {
        let root_path = root_path.as_ref().to_path_buf();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
            match res {
                Ok(event) => {
                    debug!("File system event: {:?}", event);
                    Self::handle_notify_event(event, &event_tx);
                }
                Err(e) => {
                    error!("File system watch error: {}", e);
                }
            }
        })?;

        Ok(Self {
            watcher,
            event_rx,
            watched_paths: HashSet::new(),
            root_path,
        })
    }

    /// Convert a notify event into watch events
    fn handle_notify_event(event: notify::Event, event_tx: &mpsc::UnboundedSender<WatchEvent>) {
        let make: fn(PathBuf) -> WatchEvent = match event.kind {
            notify::EventKind::Create(_) => WatchEvent::Created,
            notify::EventKind::Modify(_) => WatchEvent::Modified,
            notify::EventKind::Remove(_) => WatchEvent::Removed,
            _ => return,
        };

        for path in event.paths {
            if should_ignore_path(&path) {
                continue;
            }
            if let Err(e) = event_tx.send(make(path)) {
                warn!("Failed to send watch event: {}", e);
            }
        }
    }

    /// Watch a directory recursively
    pub fn watch_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("Watching directory: {:?}", path);

        self.watcher.watch(path, RecursiveMode::Recursive)?;
        self.watched_paths.insert(path.to_path_buf());
        Ok(())
    }

    /// Stop watching a path
    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("Stopping watch for: {:?}", path);

        self.watcher.unwatch(path)?;
        self.watched_paths.remove(path);
        Ok(())
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Get the event receiver
    pub fn event_receiver(&mut self) -> &mut mpsc::UnboundedReceiver<WatchEvent> {
        &mut self.event_rx
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.watched_paths.contains(path)
    }
}

/// Edits and deletions collected between two quiet periods.
///
/// A later event for the same path overrides an earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChanges {
    pub modified: BTreeSet<PathBuf>,
    pub removed: BTreeSet<PathBuf>,
}

impl PendingChanges {
    pub fn record(&mut self, event: WatchEvent) {
        match event {
            WatchEvent::Created(path) | WatchEvent::Modified(path) => {
                self.removed.remove(&path);
                self.modified.insert(path);
            }
            WatchEvent::Removed(path) => {
                self.modified.remove(&path);
                self.removed.insert(path);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.removed.is_empty()
    }
}

/// Watcher service that feeds batched file changes into the coordinator
pub struct WatcherService {
    watcher: Arc<RwLock<FileWatcher>>,
    coordinator: Arc<RwLock<Coordinator>>,
    plan_tx: Option<broadcast::Sender<String>>,
    debounce: Duration,
    cancel: CancellationToken,
}

impl WatcherService {
    pub fn new(root_path: impl AsRef<Path>, coordinator: Arc<RwLock<Coordinator>>) -> Result<Self> {
        let watcher = Arc::new(RwLock::new(FileWatcher::new(root_path)?));
        Ok(Self {
            watcher,
            coordinator,
            plan_tx: None,
            debounce: Duration::from_millis(100),
            cancel: CancellationToken::new(),
        })
    }

    /// Publish every revalidation plan as JSON on `plan_tx`
    pub fn with_broadcast(mut self, plan_tx: broadcast::Sender<String>) -> Self {
        self.plan_tx = Some(plan_tx);
        self
    }

    /// Quiet period that closes a batch of events
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Token that stops `process_events` and any build in flight
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start watching the workspace root
    pub async fn start_watching(&self) -> Result<()> {
        let mut watcher = self.watcher.write().await;
        let root_path = watcher.root_path.clone();

        watcher.watch_directory(&root_path)?;

        info!("Started watching workspace: {:?}", root_path);
        Ok(())
    }

    /// Process file system events in debounced batches until cancelled
    pub async fn process_events(&self) -> Result<()> {
        let mut watcher = self.watcher.write().await;
        let event_rx = watcher.event_receiver();

        loop {
            let first = tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = event_rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            let mut pending = PendingChanges::default();
            pending.record(first);
            while let Ok(Some(event)) = tokio::time::timeout(self.debounce, event_rx.recv()).await {
                pending.record(event);
            }

            debug!(
                "Processing batch: {} modified, {} removed",
                pending.modified.len(),
                pending.removed.len()
            );
            self.apply(pending).await;
        }

        info!("Stopped processing watch events");
        Ok(())
    }

    /// Apply one batch to the coordinator and publish the resulting plan
    pub async fn apply(&self, pending: PendingChanges) -> Option<RevalidationPlan> {
        let mut coordinator = self.coordinator.write().await;

        let mut removed: Vec<PathBuf> = pending
            .removed
            .into_iter()
            .filter(|path| coordinator.is_source(path))
            .collect();
        let mut modified = Vec::new();
        for path in pending.modified {
            if !coordinator.is_source(&path) {
                continue;
            }
            if path.is_file() {
                modified.push(path);
            } else {
                // Renamed away or deleted before we got to it.
                removed.push(path);
            }
        }
        if modified.is_empty() && removed.is_empty() {
            return None;
        }

        let plan = match coordinator
            .apply_changes(&modified, &removed, &self.cancel)
            .await
        {
            Ok(plan) => plan,
            Err(e) => {
                error!("Failed to apply file changes: {:#}", e);
                return None;
            }
        };
        drop(coordinator);

        info!(
            "Revalidation needed for {} documents after {} changes",
            plan.affected.len(),
            plan.changed.len()
        );

        if let Some(ref plan_tx) = self.plan_tx {
            match serde_json::to_string(&plan) {
                Ok(json) => {
                    // No subscribers is fine.
                    let _ = plan_tx.send(format!(r#"{{"type":"revalidation","plan":{}}}"#, json));
                }
                Err(e) => error!("Failed to serialize revalidation plan: {}", e),
            }
        }

        Some(plan)
    }
}

/// Check if a path should be ignored (e.g., target/, .git/, etc.)
fn should_ignore_path(path: &Path) -> bool {
    path.components().any(|component| {
        matches!(
            component.as_os_str().to_str(),
            Some("target") | Some(".git") | Some("node_modules")
        )
    })
}
