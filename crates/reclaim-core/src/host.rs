//! Collaborators the host application supplies to the index

use crate::model::AssetPath;

/// Enumerates every candidate content path.
///
/// Order carries no meaning; the index sorts the batch itself.
pub trait PathSource: Send + Sync {
    fn enumerate_paths(&self) -> Vec<AssetPath>;
}

/// Extracts the paths a single asset references.
///
/// This is format specific and may hit the disk. An error marks only this
/// path as having no dependencies for the current cycle.
pub trait DependencyResolver: Send + Sync {
    fn resolve(&self, path: &str) -> anyhow::Result<Vec<AssetPath>>;
}

/// Host classification predicates.
pub trait AssetClassifier: Send + Sync {
    /// Paths that are never reported as unused.
    fn is_ignored(&self, path: &str) -> bool;

    /// Container-type assets that get their own unused tally.
    fn is_container_kind(&self, path: &str) -> bool;
}

/// Reports an asset's on-disk size.
pub trait SizeProbe: Send + Sync {
    fn stat_bytes(&self, path: &str) -> std::io::Result<u64>;
}
