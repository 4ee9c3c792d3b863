//! Unused-asset classification

use crate::graph::GraphStore;
use crate::host::{AssetClassifier, SizeProbe};
use crate::model::UnusedKind;
use std::sync::Arc;

/// Decides whether a node is unused and which tally it belongs to.
///
/// A node is unused when it has a forward entry, nothing links back to it and
/// the host does not ignore it. Root status plays no part.
#[derive(Clone)]
pub struct UnusedClassifier {
    predicates: Arc<dyn AssetClassifier>,
    sizes: Arc<dyn SizeProbe>,
}

impl UnusedClassifier {
    pub fn new(predicates: Arc<dyn AssetClassifier>, sizes: Arc<dyn SizeProbe>) -> Self {
        Self { predicates, sizes }
    }

    /// Classify one path against the current graph.
    pub fn classify(&self, graph: &GraphStore, path: &str) -> Option<UnusedKind> {
        if !graph.contains(path) || graph.has_dependents(path) {
            return None;
        }
        if self.predicates.is_ignored(path) {
            return None;
        }
        if self.predicates.is_container_kind(path) {
            Some(UnusedKind::Scene)
        } else {
            Some(UnusedKind::File)
        }
    }

    /// Byte size of `path`; a failed stat counts as zero.
    pub fn measure(&self, path: &str) -> u64 {
        match self.sizes.stat_bytes(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!("Cannot stat {}: {}", path, e);
                0
            }
        }
    }
}

impl std::fmt::Debug for UnusedClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnusedClassifier").finish_non_exhaustive()
    }
}
