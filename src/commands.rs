//! CLI command implementations

use petgraph::dot::Dot;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tether_core::DocumentId;
use tether_engine::DocumentRegistry;
use tether_indexer::Coordinator;
use tether_watcher::WatcherService;
use tokio::sync::{RwLock, broadcast};
use tokio_util::sync::CancellationToken;

/// Open the workspace and build every source to `Validated`.
async fn load(root: &Path) -> anyhow::Result<(Coordinator, tether_indexer::BuildSummary)> {
    let mut coordinator = Coordinator::open(root)?;
    let summary = coordinator.load_workspace(&CancellationToken::new()).await?;
    Ok((coordinator, summary))
}

/// Display a document relative to the workspace root.
fn relative(coordinator: &Coordinator, id: &DocumentId) -> String {
    id.as_path()
        .strip_prefix(coordinator.root())
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| id.to_string())
}

pub async fn index(root: PathBuf, json: bool) -> anyhow::Result<()> {
    tracing::info!("Indexing workspace: {}", root.display());
    let (coordinator, summary) = load(&root).await?;
    let engine = coordinator.engine();

    tracing::info!(
        "Indexed {} documents, {} import edges",
        coordinator.registry().len(),
        engine.graph().edge_count()
    );

    if json {
        let report = serde_json::json!({
            "documents": coordinator.registry().loaded(),
            "discovered": summary.discovered,
            "unresolved": summary.unresolved,
            "skipped": summary.skipped,
            "cycles": engine.all_cycles(),
            "stats": engine.stats(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for id in coordinator.registry().loaded() {
        let imports = engine.resolved_imports(&id).len();
        let exports = engine.export_signature(&id).map_or(0, |s| s.len());
        println!(
            "{}  ({} imports, {} exports)",
            relative(&coordinator, &id),
            imports,
            exports
        );
    }
    for id in &summary.skipped {
        println!("skipped: {}", relative(&coordinator, id));
    }
    for (id, specifiers) in &summary.unresolved {
        for specifier in specifiers {
            println!(
                "unresolved: {} imports \"{}\"",
                relative(&coordinator, id),
                specifier
            );
        }
    }
    Ok(())
}

pub async fn affected(root: PathBuf, files: Vec<PathBuf>, json: bool) -> anyhow::Result<()> {
    let (mut coordinator, _) = load(&root).await?;
    let changed: Vec<DocumentId> = files.iter().map(|f| coordinator.id_for(f)).collect();
    for id in &changed {
        if !coordinator.registry().contains(id) {
            tracing::warn!("{} is not a loaded document", id);
        }
    }

    let plan = coordinator.plan(changed);

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }
    for id in &plan.affected {
        println!("{}", relative(&coordinator, id));
    }
    Ok(())
}

pub async fn cycles(root: PathBuf, json: bool) -> anyhow::Result<()> {
    let (coordinator, _) = load(&root).await?;
    let cycles = coordinator.engine().all_cycles();

    if json {
        println!("{}", serde_json::to_string_pretty(&cycles)?);
        return Ok(());
    }
    if cycles.is_empty() {
        println!("No import cycles");
    }
    for cycle in &cycles {
        let walk: Vec<String> = cycle
            .walk()
            .iter()
            .map(|id| relative(&coordinator, id))
            .collect();
        println!("{}", walk.join(" -> "));
    }
    Ok(())
}

pub async fn graph(root: PathBuf) -> anyhow::Result<()> {
    let (coordinator, _) = load(&root).await?;
    let graph = coordinator
        .engine()
        .graph()
        .to_petgraph()
        .map(|_, id| relative(&coordinator, id), |_, specifier| specifier.clone());

    println!("{}", Dot::new(&graph));
    Ok(())
}

pub async fn watch(root: PathBuf, debounce_ms: u64) -> anyhow::Result<()> {
    let (coordinator, summary) = load(&root).await?;
    let root = coordinator.root().to_path_buf();
    tracing::info!("Loaded {} documents, watching for changes", summary.built.len());

    let coordinator = Arc::new(RwLock::new(coordinator));
    let (plan_tx, mut plan_rx) = broadcast::channel(64);
    let watcher = WatcherService::new(&root, coordinator)?
        .with_debounce(Duration::from_millis(debounce_ms))
        .with_broadcast(plan_tx);

    let cancel = watcher.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down watcher");
            cancel.cancel();
        }
    });
    tokio::spawn(async move {
        while let Ok(message) = plan_rx.recv().await {
            println!("{}", message);
        }
    });

    watcher.start_watching().await?;
    watcher.process_events().await?;
    Ok(())
}
