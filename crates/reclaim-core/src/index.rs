//! One generation of derived index state

use crate::aggregation::{self, Delta};
use crate::classify::UnusedClassifier;
use crate::graph::GraphStore;
use crate::model::{FolderStats, UnusedKind};
use std::collections::{BTreeMap, BTreeSet};

/// Graph plus everything derived from it: the folder set, both unused
/// tallies and per-folder totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexState {
    pub graph: GraphStore,
    pub folders: BTreeSet<String>,
    pub unused_files: BTreeMap<String, u64>,
    pub unused_scenes: BTreeMap<String, u64>,
    pub folder_stats: BTreeMap<String, FolderStats>,
}

impl IndexState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `path` sits in either unused tally.
    pub fn is_unused(&self, path: &str) -> bool {
        self.unused_kind(path).is_some()
    }

    /// Which tally `path` is in, if any.
    pub fn unused_kind(&self, path: &str) -> Option<UnusedKind> {
        if self.unused_files.contains_key(path) {
            Some(UnusedKind::File)
        } else if self.unused_scenes.contains_key(path) {
            Some(UnusedKind::Scene)
        } else {
            None
        }
    }

    /// Reclaimable bytes for an unused path.
    pub fn unused_bytes(&self, path: &str) -> Option<u64> {
        self.unused_files
            .get(path)
            .or_else(|| self.unused_scenes.get(path))
            .copied()
    }

    /// Totals for a folder with at least one unused descendant.
    pub fn folder_stats(&self, folder: &str) -> Option<FolderStats> {
        self.folder_stats.get(folder).copied()
    }

    /// Totals across the whole index.
    pub fn totals(&self) -> FolderStats {
        FolderStats {
            file_count: self.unused_files.len() as u32,
            scene_count: self.unused_scenes.len() as u32,
            total_bytes: self.unused_files.values().chain(self.unused_scenes.values()).sum(),
        }
    }

    /// Record an unused entry without touching folder stats.
    ///
    /// Used while building, before folders are aggregated.
    pub fn insert_unused(&mut self, path: String, kind: UnusedKind, bytes: u64) {
        match kind {
            UnusedKind::File => self.unused_files.insert(path, bytes),
            UnusedKind::Scene => self.unused_scenes.insert(path, bytes),
        };
    }

    /// Register the folders above `path`.
    ///
    /// Paths are opaque, so a new folder may coincide with a path that is
    /// already tallied (`A/b` next to `A/b/c`). Fresh folders start from
    /// whatever the tallies already hold beneath them.
    pub fn track_folders(&mut self, path: &str) {
        for folder in aggregation::register_folders(&mut self.folders, path) {
            let stats = aggregation::aggregate_folder(&folder, &self.unused_files, &self.unused_scenes);
            if !stats.is_empty() {
                self.folder_stats.insert(folder, stats);
            }
        }
    }

    /// Forget folders around a departed `path` that no longer hold any node.
    pub fn prune_folders(&mut self, path: &str) {
        let candidates: Vec<String> = aggregation::ancestor_folders(path)
            .chain(std::iter::once(path))
            .filter(|folder| self.folders.contains(*folder))
            .map(str::to_string)
            .collect();

        // Deepest first; a folder that still holds nodes keeps its ancestors alive
        for folder in candidates.iter().rev() {
            if self.graph.paths_under(folder).next().is_some() {
                break;
            }
            self.folders.remove(folder);
            self.folder_stats.remove(folder);
        }
    }

    /// Drop `path` from the tallies and from its folders' totals.
    pub fn forget(&mut self, path: &str) {
        let removed = match self.unused_files.remove(path) {
            Some(bytes) => Some((UnusedKind::File, bytes)),
            None => self
                .unused_scenes
                .remove(path)
                .map(|bytes| (UnusedKind::Scene, bytes)),
        };

        if let Some((kind, bytes)) = removed {
            aggregation::apply_delta(
                &self.folders,
                &mut self.folder_stats,
                path,
                kind,
                bytes,
                Delta::Subtract,
            );
        }
    }

    /// Re-derive `path`'s unused status after a graph change, keeping folder
    /// totals in step.
    pub fn reclassify(&mut self, path: &str, classifier: &UnusedClassifier) {
        self.forget(path);

        if let Some(kind) = classifier.classify(&self.graph, path) {
            let bytes = classifier.measure(path);
            self.insert_unused(path.to_string(), kind, bytes);
            aggregation::apply_delta(
                &self.folders,
                &mut self.folder_stats,
                path,
                kind,
                bytes,
                Delta::Add,
            );
        }
    }
}
