//! Unit tests for tether-indexer

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use tether_core::{DocumentId, DocumentState};
use tether_engine::DocumentRegistry;
use tokio_util::sync::CancellationToken;

use crate::coordinator::Coordinator;
use crate::extractor::OutlineExtractor;
use crate::outline::RegexOutline;

fn outline(text: &str) -> tether_core::Document {
    RegexOutline::new()
        .unwrap()
        .outline(&DocumentId::new("/ws/test.x"), text)
}

fn fingerprints(text: &str) -> Vec<String> {
    outline(text).exports.iter().map(|e| e.fingerprint()).collect()
}

#[test]
fn test_outline_imports() {
    let doc = outline(
        r#"
import "leaf";
import "./shared/types.x" as T
Domain Y {}
"#,
    );

    assert_eq!(doc.imports.len(), 2);
    assert_eq!(doc.imports[0].specifier, "leaf");
    assert_eq!(doc.imports[0].alias, None);
    assert_eq!(doc.imports[1].specifier, "./shared/types.x");
    assert_eq!(doc.imports[1].alias.as_deref(), Some("T"));
    assert_eq!(doc.state, DocumentState::Parsed);
}

#[test]
fn test_outline_nested_declarations() {
    let exports = fingerprints(
        r#"
Domain Sales {
    description "Everything about selling"
    Team Inside {}
    Team Field {
        Role Lead {}
    }
}
Domain X{}
"#,
    );

    insta::assert_json_snapshot!(exports, @r###"
    [
      "Domain:Sales",
      "Team:Sales.Inside",
      "Team:Sales.Field",
      "Role:Sales.Field.Lead",
      "Domain:X"
    ]
    "###);
}

#[test]
fn test_outline_ignores_strings_and_comments() {
    let doc = outline(
        r#"
// import "commented"
/* Domain Hidden {} */
# Team AlsoHidden {}
Domain Shown {
    note "Domain Quoted {} import \"x\""
}
"#,
    );

    assert!(doc.imports.is_empty());
    assert_eq!(
        doc.exports.iter().map(|e| e.fingerprint()).collect::<Vec<_>>(),
        vec!["Domain:Shown".to_string()]
    );
}

#[test]
fn test_outline_skips_declarations_in_plain_blocks() {
    let exports = fingerprints(
        r#"
Domain A {
    settings {
        Team Inner {}
    }
    Team Kept {}
}
"#,
    );
    assert_eq!(exports, vec!["Domain:A".to_string(), "Team:A.Kept".to_string()]);
}

#[test]
fn test_extract_rejects_invalid_utf8() {
    let extractor = RegexOutline::new().unwrap();
    let result = extractor.extract(&DocumentId::new("/ws/bad.x"), &[0xff, 0xfe]);
    assert!(result.is_err());
}

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

fn chain_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "leaf.x", "Domain X {}");
    write(dir.path(), "mid.x", "import \"leaf\"\nDomain Y {}");
    write(dir.path(), "root.x", "import \"mid\"\nDomain Z {}");
    write(dir.path(), "notes.md", "Domain Ignored {}");
    dir
}

#[tokio::test]
async fn test_load_workspace_validates_every_source() {
    let dir = chain_workspace();
    let mut coordinator = Coordinator::open(dir.path()).unwrap();

    let summary = coordinator
        .load_workspace(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.built.len(), 3);
    assert!(summary.unresolved.is_empty());
    for id in coordinator.registry().loaded() {
        assert_eq!(coordinator.registry().state(&id), Some(DocumentState::Validated));
    }

    let leaf = coordinator.id_for(Path::new("leaf.x"));
    let mid = coordinator.id_for(Path::new("mid.x"));
    assert!(coordinator.engine().dependents_of(&leaf).contains(&mid));
}

#[tokio::test]
async fn test_body_edit_plans_direct_importers_only() {
    let dir = chain_workspace();
    let mut coordinator = Coordinator::open(dir.path()).unwrap();
    let cancel = CancellationToken::new();
    coordinator.load_workspace(&cancel).await.unwrap();
    let leaf_path = coordinator.root().join("leaf.x");

    write(dir.path(), "leaf.x", "Domain X { description \"edited\" }");
    let plan = coordinator
        .update_files(std::slice::from_ref(&leaf_path), &cancel)
        .await
        .unwrap();
    assert_eq!(plan.affected, vec![coordinator.id_for(Path::new("mid.x"))]);

    write(dir.path(), "leaf.x", "Domain X {}\nTeam T {}");
    let plan = coordinator
        .update_files(std::slice::from_ref(&leaf_path), &cancel)
        .await
        .unwrap();
    assert_eq!(
        plan.affected,
        vec![
            coordinator.id_for(Path::new("mid.x")),
            coordinator.id_for(Path::new("root.x")),
        ]
    );
}

#[tokio::test]
async fn test_discovered_imports_are_built() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "tether.toml",
        "include = [\"app/**/*.x\"]\n[aliases]\n\"@lib\" = \"lib\"\n",
    );
    write(dir.path(), "app/main.x", "import \"@lib/shared\"\nDomain App {}");
    write(dir.path(), "lib/shared.x", "Domain Shared {}");

    let mut coordinator = Coordinator::open(dir.path()).unwrap();
    let summary = coordinator
        .load_workspace(&CancellationToken::new())
        .await
        .unwrap();

    let shared = coordinator.id_for(Path::new("lib/shared.x"));
    assert_eq!(summary.discovered, vec![shared.clone()]);
    assert_eq!(summary.built.len(), 2);
    assert_eq!(coordinator.registry().state(&shared), Some(DocumentState::Validated));
}

#[tokio::test]
async fn test_unresolved_imports_reported() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.x", "import \"missing\"\nDomain A {}");

    let mut coordinator = Coordinator::open(dir.path()).unwrap();
    let summary = coordinator
        .load_workspace(&CancellationToken::new())
        .await
        .unwrap();

    let a = coordinator.id_for(Path::new("a.x"));
    assert_eq!(summary.unresolved.get(&a), Some(&vec!["missing".to_string()]));
}

#[tokio::test]
async fn test_remove_file_plans_importers() {
    let dir = chain_workspace();
    let mut coordinator = Coordinator::open(dir.path()).unwrap();
    coordinator
        .load_workspace(&CancellationToken::new())
        .await
        .unwrap();

    let leaf_path = coordinator.root().join("leaf.x");
    fs::remove_file(&leaf_path).unwrap();
    let leaf = coordinator.id_for(&leaf_path);
    let plan = coordinator.remove_files(&[leaf_path]);

    assert_eq!(plan.changed, vec![leaf.clone()]);
    assert_eq!(plan.affected, vec![coordinator.id_for(Path::new("mid.x"))]);
    assert!(!coordinator.registry().contains(&leaf));
    assert!(coordinator.engine().dependents_of(&leaf).is_empty());
}

#[tokio::test]
async fn test_unreadable_file_skipped_on_load() {
    let dir = chain_workspace();
    fs::write(dir.path().join("blob.x"), [0xff, 0xfe, 0x00]).unwrap();

    let mut coordinator = Coordinator::open(dir.path()).unwrap();
    let summary = coordinator
        .load_workspace(&CancellationToken::new())
        .await
        .unwrap();

    let blob = coordinator.id_for(Path::new("blob.x"));
    assert_eq!(summary.skipped, vec![blob.clone()]);
    assert_eq!(summary.built.len(), 3);
    assert!(!coordinator.registry().contains(&blob));

    let leaf = coordinator.id_for(Path::new("leaf.x"));
    let mid = coordinator.id_for(Path::new("mid.x"));
    assert!(coordinator.engine().dependents_of(&leaf).contains(&mid));
}

#[tokio::test]
async fn test_unreadable_discovered_import_skipped() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "tether.toml", "include = [\"app/**/*.x\"]\n");
    write(dir.path(), "app/main.x", "import \"../lib/shared\"\nDomain App {}");
    fs::create_dir_all(dir.path().join("lib")).unwrap();
    fs::write(dir.path().join("lib/shared.x"), [0xff, 0xfe]).unwrap();

    let mut coordinator = Coordinator::open(dir.path()).unwrap();
    let summary = coordinator
        .load_workspace(&CancellationToken::new())
        .await
        .unwrap();

    let main = coordinator.id_for(Path::new("app/main.x"));
    let shared = coordinator.id_for(Path::new("lib/shared.x"));
    assert_eq!(summary.built, vec![main]);
    assert_eq!(summary.skipped, vec![shared.clone()]);
    assert!(!coordinator.registry().contains(&shared));
}

#[tokio::test]
async fn test_unreadable_edit_keeps_removal_plan() {
    let dir = chain_workspace();
    let mut coordinator = Coordinator::open(dir.path()).unwrap();
    let cancel = CancellationToken::new();
    coordinator.load_workspace(&cancel).await.unwrap();

    let leaf_path = coordinator.root().join("leaf.x");
    let root_path = coordinator.root().join("root.x");
    fs::remove_file(&leaf_path).unwrap();
    fs::write(&root_path, [0xff, 0xfe]).unwrap();

    let plan = coordinator
        .apply_changes(
            std::slice::from_ref(&root_path),
            std::slice::from_ref(&leaf_path),
            &cancel,
        )
        .await
        .unwrap();

    let leaf = coordinator.id_for(&leaf_path);
    let root = coordinator.id_for(&root_path);
    let mid = coordinator.id_for(Path::new("mid.x"));
    assert_eq!(plan.changed, vec![leaf.clone(), root.clone()]);
    assert_eq!(plan.affected, vec![mid.clone()]);
    assert!(!coordinator.registry().contains(&leaf));

    // The unreadable file keeps its last good index.
    assert!(coordinator.registry().contains(&root));
    assert_eq!(coordinator.engine().dependencies_of(&root), vec![mid]);
}

#[tokio::test]
async fn test_cancelled_build_fails() {
    let dir = chain_workspace();
    let mut coordinator = Coordinator::open(dir.path()).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert!(coordinator.load_workspace(&cancel).await.is_err());
}
