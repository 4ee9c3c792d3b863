//! In-memory host for scheduler tests

use crate::scheduler::{Collaborators, IncrementalScheduler};
use anyhow::anyhow;
use reclaim_core::{AssetClassifier, AssetPath, DependencyResolver, PathSource, SizeProbe};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// A repository held in memory: paths with their references and sizes.
#[derive(Default)]
pub struct MemoryHost {
    assets: RwLock<BTreeMap<String, (Vec<String>, u64)>>,
    failing: RwLock<HashSet<String>>,
    ignored: HashSet<String>,
}

impl MemoryHost {
    pub fn new(assets: &[(&str, &[&str], u64)]) -> Self {
        let host = Self::default();
        for (path, deps, size) in assets {
            host.put(path, deps, *size);
        }
        host
    }

    /// Fixture with a cycle, an isolated texture, an ignored script, two
    /// unreferenced scenes and a prefix-sharing sibling folder.
    pub fn sample() -> Self {
        let mut host = Self::new(&[
            ("Assets/Scenes/Main.unity", &["Assets/Prefabs/Player.prefab", "Assets/Art/hero.png"], 5000),
            ("Assets/Scenes/Old.unity", &["Assets/Art/hero.png"], 3000),
            ("Assets/Prefabs/Player.prefab", &["Assets/Materials/hero.mat", "Assets/Scripts/Player.cs"], 400),
            ("Assets/Materials/hero.mat", &["Assets/Art/hero.png", "Assets/Shaders/toon.shader"], 200),
            ("Assets/Shaders/toon.shader", &[], 150),
            ("Assets/Art/hero.png", &[], 1000),
            ("Assets/Art/unused.png", &[], 700),
            ("Assets/ArtOther/y.png", &[], 90),
            ("Assets/Scripts/Player.cs", &[], 60),
            ("Assets/Cycle/a.asset", &["Assets/Cycle/b.asset"], 10),
            ("Assets/Cycle/b.asset", &["Assets/Cycle/a.asset"], 20),
            ("Assets/Editor/tool.cs", &[], 30),
        ]);
        host.ignored.insert("Assets/Editor/tool.cs".to_string());
        host
    }

    pub fn put(&self, path: &str, deps: &[&str], size: u64) {
        let deps = deps.iter().map(|dep| dep.to_string()).collect();
        if let Ok(mut assets) = self.assets.write() {
            assets.insert(path.to_string(), (deps, size));
        }
    }

    pub fn delete(&self, path: &str) {
        if let Ok(mut assets) = self.assets.write() {
            assets.remove(path);
        }
    }

    pub fn rename(&self, old_path: &str, new_path: &str) {
        if let Ok(mut assets) = self.assets.write() {
            if let Some(entry) = assets.remove(old_path) {
                assets.insert(new_path.to_string(), entry);
            }
            for (deps, _) in assets.values_mut() {
                for dep in deps.iter_mut() {
                    if dep == old_path {
                        *dep = new_path.to_string();
                    }
                }
            }
        }
    }

    pub fn fail_on(&self, path: &str) {
        if let Ok(mut failing) = self.failing.write() {
            failing.insert(path.to_string());
        }
    }
}

impl PathSource for MemoryHost {
    fn enumerate_paths(&self) -> Vec<AssetPath> {
        // Reverse order: the scheduler must not depend on enumeration order
        self.assets
            .read()
            .map(|assets| assets.keys().rev().cloned().collect())
            .unwrap_or_default()
    }
}

impl DependencyResolver for MemoryHost {
    fn resolve(&self, path: &str) -> anyhow::Result<Vec<AssetPath>> {
        if self.failing.read().is_ok_and(|failing| failing.contains(path)) {
            return Err(anyhow!("malformed asset {path}"));
        }
        let assets = self.assets.read().map_err(|_| anyhow!("host poisoned"))?;
        Ok(assets.get(path).map(|(deps, _)| deps.clone()).unwrap_or_default())
    }
}

impl AssetClassifier for MemoryHost {
    fn is_ignored(&self, path: &str) -> bool {
        self.ignored.contains(path)
    }

    fn is_container_kind(&self, path: &str) -> bool {
        path.ends_with(".unity")
    }
}

impl SizeProbe for MemoryHost {
    fn stat_bytes(&self, path: &str) -> std::io::Result<u64> {
        self.assets
            .read()
            .ok()
            .and_then(|assets| assets.get(path).map(|(_, size)| *size))
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, path.to_string()))
    }
}

pub fn collaborators(host: &Arc<MemoryHost>) -> Collaborators {
    Collaborators {
        paths: host.clone(),
        resolver: host.clone(),
        predicates: host.clone(),
        sizes: host.clone(),
    }
}

/// Run a cycle to completion with an unlimited budget.
pub fn run_to_completion(scheduler: &mut IncrementalScheduler) {
    scheduler.init().unwrap();
    while scheduler.process_incremental(Duration::MAX) {
        std::thread::yield_now();
    }
}

/// Build a fresh index of `host` in a new scheduler.
pub fn fresh_build(host: &Arc<MemoryHost>) -> IncrementalScheduler {
    let mut scheduler = IncrementalScheduler::new(collaborators(host));
    run_to_completion(&mut scheduler);
    scheduler
}
