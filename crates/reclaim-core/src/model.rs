//! Core value types shared by the index

use serde::{Deserialize, Serialize};

/// Opaque, case-sensitive, `/`-delimited content path.
///
/// Paths are compared ordinally; the index never normalizes them.
pub type AssetPath = String;

/// Which tally an unreferenced path lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnusedKind {
    /// Plain file asset.
    File,
    /// Large container asset (scene-like), as decided by the host.
    Scene,
}

/// Reclaimable totals for everything below one folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FolderStats {
    /// Unused plain files under the folder (all depths).
    pub file_count: u32,
    /// Unused scenes under the folder (all depths).
    pub scene_count: u32,
    /// Combined byte size of both.
    pub total_bytes: u64,
}

impl FolderStats {
    pub fn is_empty(&self) -> bool {
        self.file_count == 0 && self.scene_count == 0
    }

    /// Account for one unused entry of `kind` weighing `bytes`.
    pub fn add(&mut self, kind: UnusedKind, bytes: u64) {
        match kind {
            UnusedKind::File => self.file_count += 1,
            UnusedKind::Scene => self.scene_count += 1,
        }
        self.total_bytes += bytes;
    }

    /// Undo a previous [`FolderStats::add`].
    pub fn subtract(&mut self, kind: UnusedKind, bytes: u64) {
        match kind {
            UnusedKind::File => self.file_count = self.file_count.saturating_sub(1),
            UnusedKind::Scene => self.scene_count = self.scene_count.saturating_sub(1),
        }
        self.total_bytes = self.total_bytes.saturating_sub(bytes);
    }

    /// Total number of unused entries of either kind.
    pub fn entry_count(&self) -> u32 {
        self.file_count + self.scene_count
    }
}

/// Identifies the environment a cached index was built against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Number of candidate paths the path source reported.
    pub path_count: u32,
    /// Cache format version string.
    pub version: String,
}

impl Fingerprint {
    pub fn new(path_count: u32, version: impl Into<String>) -> Self {
        Self {
            path_count,
            version: version.into(),
        }
    }
}
