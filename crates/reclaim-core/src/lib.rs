//! Reclaim Core — reference graph, unused-asset classification, folder stats and the index cache

pub mod graph;
pub mod model;
pub mod host;
pub mod classify;
pub mod aggregation;
pub mod index;
pub mod cache;
pub mod error;


#[cfg(test)]
pub mod test_utils;

pub use model::{AssetPath, FolderStats, Fingerprint, UnusedKind};
pub use graph::GraphStore;
pub use host::{AssetClassifier, DependencyResolver, PathSource, SizeProbe};
pub use classify::UnusedClassifier;
pub use aggregation::{aggregate_folder, ancestor_folders, is_ancestor, register_folders};
pub use index::IndexState;
pub use cache::{CACHE_DIR, INDEX_CACHE, CACHE_FORMAT_VERSION, CacheSnapshot, cache_dir, index_cache_path, ensure_cache_dir, save_index, load_index, clear_cache};
pub use error::{CacheError, IndexError};
