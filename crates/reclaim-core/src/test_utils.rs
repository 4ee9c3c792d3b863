//! Test fixtures for the core index

use crate::aggregation::{aggregate_folder, register_folders};
use crate::classify::UnusedClassifier;
use crate::graph::GraphStore;
use crate::host::{AssetClassifier, SizeProbe};
use crate::index::IndexState;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Predicates driven by fixed path lists.
#[derive(Default)]
pub struct StaticPredicates {
    pub ignored: HashSet<String>,
    pub containers: HashSet<String>,
}

impl AssetClassifier for StaticPredicates {
    fn is_ignored(&self, path: &str) -> bool {
        self.ignored.contains(path)
    }

    fn is_container_kind(&self, path: &str) -> bool {
        self.containers.contains(path) || path.ends_with(".unity")
    }
}

/// Sizes from a table; anything missing fails like a deleted file.
#[derive(Default)]
pub struct TableSizes(pub HashMap<String, u64>);

impl SizeProbe for TableSizes {
    fn stat_bytes(&self, path: &str) -> std::io::Result<u64> {
        self.0
            .get(path)
            .copied()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, path.to_string()))
    }
}

/// (path, dependencies, size) rows of the reference fixture.
///
/// Contains a two-node cycle, an isolated texture, an ignored editor script,
/// two scenes nothing points at and a sibling folder sharing a name prefix.
pub const SAMPLE: &[(&str, &[&str], u64)] = &[
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
];

pub fn sample_graph() -> GraphStore {
    let mut graph = GraphStore::new();
    for (path, deps, _) in SAMPLE {
        graph.add_or_update(path, deps.iter().copied());
    }
    graph
}

pub fn sample_sizes() -> TableSizes {
    TableSizes(
        SAMPLE
            .iter()
            .map(|(path, _, size)| (path.to_string(), *size))
            .collect(),
    )
}

pub fn sample_classifier() -> UnusedClassifier {
    let predicates = StaticPredicates {
        ignored: HashSet::from(["Assets/Editor/tool.cs".to_string()]),
        containers: HashSet::new(),
    };
    UnusedClassifier::new(Arc::new(predicates), Arc::new(sample_sizes()))
}

/// Derive a full generation in one pass, as a reference for incremental results.
pub fn derive_state(graph: GraphStore, classifier: &UnusedClassifier) -> IndexState {
    let mut state = IndexState {
        graph,
        ..IndexState::default()
    };

    let paths: Vec<String> = state.graph.paths().cloned().collect();
    for path in &paths {
        register_folders(&mut state.folders, path);
        if let Some(kind) = classifier.classify(&state.graph, path) {
            let bytes = classifier.measure(path);
            state.insert_unused(path.clone(), kind, bytes);
        }
    }

    for folder in &state.folders {
        let stats = aggregate_folder(folder, &state.unused_files, &state.unused_scenes);
        if !stats.is_empty() {
            state.folder_stats.insert(folder.clone(), stats);
        }
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_graph_is_consistent() {
        let graph = sample_graph();
        assert_eq!(graph.node_count(), SAMPLE.len());
        assert!(graph.verify_mirror().is_ok());
    }
}
