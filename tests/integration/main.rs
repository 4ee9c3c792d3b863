//! Integration tests for Reclaim
//!
//! These tests run the whole pipeline over a real directory tree.

use reclaim_core::{FolderStats, index_cache_path};
use reclaim_indexer::{
    Collaborators, CycleOutcome, FsSizeProbe, GlobClassifier, IncrementalScheduler, ReclaimConfig,
    TextReferenceResolver, WalkPathSource,
};
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const MAIN_SCENE: &str = "prefab: ../Prefabs/Player.prefab\n";
const OLD_SCENE: &str = "texture: ../Art/hero.png\n";

fn write_file(root: &Path, path: &str, contents: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, contents).unwrap();
}

fn sample_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_file(root, ".reclaim.toml", "ignore = [\"Assets/Editor/**\"]\n");
    write_file(root, "Assets/Scenes/Main.unity", MAIN_SCENE);
    write_file(root, "Assets/Scenes/Old.unity", OLD_SCENE);
    write_file(root, "Assets/Prefabs/Player.prefab", "sprite: ../Art/hero.png\n");
    write_file(root, "Assets/Art/hero.png", "PNG");
    write_file(root, "Assets/Art/unused.png", "0123456789");
    write_file(root, "Assets/Editor/tool.cs", "class Tool {}");
    dir
}

fn scheduler_for(root: &Path) -> IncrementalScheduler {
    let config = ReclaimConfig::load(root).unwrap();
    let hosts = Collaborators {
        paths: Arc::new(WalkPathSource::new(root)),
        resolver: Arc::new(TextReferenceResolver::from_config(root, &config).unwrap()),
        predicates: Arc::new(GlobClassifier::from_config(&config).unwrap()),
        sizes: Arc::new(FsSizeProbe::new(root)),
    };
    IncrementalScheduler::new(hosts).with_cache(index_cache_path(root))
}

fn build(root: &Path) -> IncrementalScheduler {
    let mut scheduler = scheduler_for(root);
    scheduler.init().unwrap();
    while scheduler.process_incremental(Duration::from_millis(2)) {
        std::thread::yield_now();
    }
    scheduler
}

#[test]
fn test_pipeline_over_directory_tree() {
    let project = sample_project();
    let root = project.path();
    let mut first = build(root);

    assert_eq!(first.last_outcome(), Some(CycleOutcome::Rebuilt));
    assert!(first.is_unused("Assets/Scenes/Main.unity"));
    assert!(first.is_unused("Assets/Scenes/Old.unity"));
    assert!(first.is_unused("Assets/Art/unused.png"));
    assert!(!first.is_unused("Assets/Art/hero.png"));
    assert!(!first.is_unused("Assets/Prefabs/Player.prefab"));
    assert!(!first.is_unused("Assets/Editor/tool.cs"));

    assert_eq!(
        first.folder_stats("Assets/Art"),
        Some(FolderStats { file_count: 1, scene_count: 0, total_bytes: 10 })
    );
    assert_eq!(
        first.folder_stats("Assets/Scenes"),
        Some(FolderStats {
            file_count: 0,
            scene_count: 2,
            total_bytes: (MAIN_SCENE.len() + OLD_SCENE.len()) as u64,
        })
    );
    assert_eq!(first.folder_stats("Assets/Prefabs"), None);
    assert_eq!(first.state().totals(), first.folder_stats("Assets").unwrap());

    // An unchanged tree is restored from the cache
    assert_eq!(first.flush_pending_save(), Some(true));
    let second = build(root);
    assert_eq!(second.last_outcome(), Some(CycleOutcome::CacheHit));
    assert_eq!(second.state(), first.state());

    // A new file changes the path count and forces a rebuild
    write_file(root, "Assets/Art/extra.png", "12345");
    let third = build(root);
    assert_eq!(third.last_outcome(), Some(CycleOutcome::Rebuilt));
    assert_eq!(third.unused_bytes("Assets/Art/extra.png"), Some(5));
}

#[test]
fn test_change_notifications_over_directory_tree() {
    let project = sample_project();
    let root = project.path();
    let mut scheduler = build(root);

    // Old scene starts pulling in the unused texture
    write_file(root, "Assets/Scenes/Old.unity", "texture: ../Art/unused.png\n");
    scheduler.notify_created_or_changed("Assets/Scenes/Old.unity");
    assert!(!scheduler.is_unused("Assets/Art/unused.png"));
    assert_eq!(scheduler.folder_stats("Assets/Art"), None);

    fs::remove_file(root.join("Assets/Scenes/Main.unity")).unwrap();
    scheduler.notify_removed("Assets/Scenes/Main.unity");
    assert!(scheduler.is_unused("Assets/Prefabs/Player.prefab"));

    let rebuilt = build(root);
    assert_eq!(scheduler.state().unused_files, rebuilt.state().unused_files);
    assert_eq!(scheduler.state().unused_scenes, rebuilt.state().unused_scenes);
    assert_eq!(scheduler.state().folder_stats, rebuilt.state().folder_stats);
}

#[test]
fn test_cli_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_reclaim"))
        .arg("version")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Reclaim v"));
}

#[test]
fn test_cli_report_json_and_clear() {
    let project = sample_project();
    let root = project.path();

    let output = Command::new(env!("CARGO_BIN_EXE_reclaim"))
        .arg("--root")
        .arg(root)
        .args(["report", "--json", "--top", "2"])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["folder"], "Assets");
    assert_eq!(rows[0]["file_count"], 1);
    assert_eq!(rows[0]["scene_count"], 2);
    assert!(index_cache_path(root).exists());

    let output = Command::new(env!("CARGO_BIN_EXE_reclaim"))
        .arg("--root")
        .arg(root)
        .arg("clear")
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());
    assert!(!root.join(".reclaim").exists());
}
