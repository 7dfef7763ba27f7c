//! Integration tests for Tether
//!
//! These tests drive the CLI and the library crates against real workspaces on disk.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;
use tether_engine::ChangeSet;
use tether_indexer::Coordinator;
use tether_watcher::{PendingChanges, WatchEvent, WatcherService};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

/// leaf <- mid <- root, plus a pair of mutually importing documents.
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "leaf.x", "Domain X {}");
    write(dir.path(), "mid.x", "import \"leaf\"\nDomain Y {}");
    write(dir.path(), "root.x", "import \"mid\"\nDomain Z {}");
    write(dir.path(), "cycle/a.x", "import \"b\"\nDomain A {}");
    write(dir.path(), "cycle/b.x", "import \"a\"\nDomain B {}");
    dir
}

fn tether(root: &Path, args: &[&str]) -> String {
    let output = Command::new(env!("CARGO_BIN_EXE_tether"))
        .arg("--root")
        .arg(root)
        .args(args)
        .output()
        .expect("Failed to execute tether");
    assert!(
        output.status.success(),
        "tether {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_tether"))
        .arg("--help")
        .output()
        .expect("Failed to execute tether");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Incremental import tracking"));
}

#[test]
fn test_cli_index_json() {
    let dir = workspace();
    let stdout = tether(dir.path(), &["index", "--json"]);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();

    assert_eq!(report["documents"].as_array().unwrap().len(), 5);
    assert_eq!(report["cycles"].as_array().unwrap().len(), 1);
}

#[test]
fn test_cli_affected() {
    let dir = workspace();
    let stdout = tether(dir.path(), &["affected", "leaf.x"]);
    let lines: Vec<&str> = stdout.lines().collect();

    // Every document was just loaded, so the walk reaches transitive importers.
    assert_eq!(lines, vec!["mid.x", "root.x"]);
}

#[test]
fn test_cli_cycles_and_graph() {
    let dir = workspace();

    let cycles = tether(dir.path(), &["cycles"]);
    assert!(cycles.contains("cycle/a.x"));
    assert!(cycles.contains("cycle/b.x"));

    let dot = tether(dir.path(), &["graph"]);
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("mid.x"));
}

#[tokio::test]
async fn test_edit_cycle_end_to_end() {
    let dir = workspace();
    let mut coordinator = Coordinator::open(dir.path()).unwrap();
    let cancel = CancellationToken::new();
    coordinator.load_workspace(&cancel).await.unwrap();
    let root = coordinator.root().to_path_buf();

    // Body edit: only the direct importer.
    write(&root, "leaf.x", "Domain X { note \"v2\" }");
    let plan = coordinator
        .update_files(&[root.join("leaf.x")], &cancel)
        .await
        .unwrap();
    assert_eq!(plan.affected, vec![coordinator.id_for(Path::new("mid.x"))]);

    // New export: transitive importers too.
    write(&root, "leaf.x", "Domain X {}\nTeam T {}");
    let plan = coordinator
        .update_files(&[root.join("leaf.x")], &cancel)
        .await
        .unwrap();
    assert_eq!(plan.affected.len(), 2);

    coordinator.engine().verify().unwrap();
}

#[tokio::test]
async fn test_cycle_records_after_rebuild() {
    let dir = workspace();
    let mut coordinator = Coordinator::open(dir.path()).unwrap();
    coordinator
        .load_workspace(&CancellationToken::new())
        .await
        .unwrap();

    let a = coordinator.id_for(Path::new("cycle/a.x"));
    let b = coordinator.id_for(Path::new("cycle/b.x"));
    for id in [&a, &b] {
        let record = coordinator.engine().cycle_for(id).unwrap();
        assert!(record.contains(&a));
        assert!(record.contains(&b));
    }
    assert!(coordinator
        .engine()
        .cycle_for(&coordinator.id_for(Path::new("leaf.x")))
        .is_none());
}

#[tokio::test]
async fn test_shared_change_set_walks_once() {
    let dir = workspace();
    let mut coordinator = Coordinator::open(dir.path()).unwrap();
    coordinator
        .load_workspace(&CancellationToken::new())
        .await
        .unwrap();

    let leaf = coordinator.id_for(Path::new("leaf.x"));
    let mid = coordinator.id_for(Path::new("mid.x"));
    let root = coordinator.id_for(Path::new("root.x"));
    let engine = coordinator.engine_mut();
    let before = engine.stats().graph_walks;

    let changed = ChangeSet::new([leaf.clone()]);
    assert!(engine.is_affected(&mid, &changed));
    assert!(engine.is_affected(&root, &changed));
    assert_eq!(engine.stats().graph_walks, before + 1);

    let again = ChangeSet::new([leaf]);
    assert!(engine.is_affected(&root, &again));
    assert_eq!(engine.stats().graph_walks, before + 2);
}

#[tokio::test]
async fn test_watcher_batch_through_service() {
    let dir = workspace();
    let mut coordinator = Coordinator::open(dir.path()).unwrap();
    coordinator
        .load_workspace(&CancellationToken::new())
        .await
        .unwrap();
    let root = coordinator.root().to_path_buf();
    let coordinator = Arc::new(RwLock::new(coordinator));
    let service = WatcherService::new(&root, coordinator.clone()).unwrap();

    fs::remove_file(root.join("leaf.x")).unwrap();
    let mut pending = PendingChanges::default();
    pending.record(WatchEvent::Removed(root.join("leaf.x")));

    let plan = service.apply(pending).await.unwrap();
    let coordinator = coordinator.read().await;
    assert_eq!(plan.affected, vec![coordinator.id_for(Path::new("mid.x"))]);
    assert_eq!(coordinator.registry().len(), 4);
}
