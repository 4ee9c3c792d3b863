//! Per-folder aggregation of unused assets

use crate::model::{FolderStats, UnusedKind};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// True when `folder` contains `path` at any depth.
///
/// The prefix must end on a segment boundary: `Assets/Art` contains
/// `Assets/Art/x.png` but not `Assets/ArtOther/y.png`. A path equal to the
/// folder also counts.
pub fn is_ancestor(folder: &str, path: &str) -> bool {
    path.starts_with(folder)
        && (path.len() == folder.len() || path.as_bytes()[folder.len()] == b'/')
}

/// Proper ancestor folders of `path`, shallowest first.
///
/// `Assets/Art/x.png` yields `Assets` then `Assets/Art`.
pub fn ancestor_folders(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/')
        .map(move |(idx, _)| &path[..idx])
        .filter(|folder| !folder.is_empty())
}

/// Record every ancestor folder of `path` in the folder set, returning the
/// ones that were not known before.
pub fn register_folders(folders: &mut BTreeSet<String>, path: &str) -> Vec<String> {
    let mut added = Vec::new();
    for folder in ancestor_folders(path) {
        if !folders.contains(folder) {
            folders.insert(folder.to_string());
            added.push(folder.to_string());
        }
    }
    added
}

/// Sum the unused entries that live under `folder`.
///
/// Both tallies are ordered maps, so descendants form one contiguous range
/// starting at `folder`.
pub fn aggregate_folder(
    folder: &str,
    unused_files: &BTreeMap<String, u64>,
    unused_scenes: &BTreeMap<String, u64>,
) -> FolderStats {
    let mut stats = FolderStats::default();
    for bytes in descendants(folder, unused_files) {
        stats.add(UnusedKind::File, bytes);
    }
    for bytes in descendants(folder, unused_scenes) {
        stats.add(UnusedKind::Scene, bytes);
    }
    stats
}

fn descendants<'a>(folder: &'a str, tally: &'a BTreeMap<String, u64>) -> impl Iterator<Item = u64> + 'a {
    tally
        .range::<str, _>((Bound::Included(folder), Bound::Unbounded))
        .take_while(move |(path, _)| path.starts_with(folder))
        .filter(move |(path, _)| is_ancestor(folder, path))
        .map(|(_, bytes)| *bytes)
}

/// Whether an unused entry is entering or leaving the tallies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    Add,
    Subtract,
}

/// Adjust the stats of every known folder containing `path`.
///
/// Folders whose counts drop to zero are removed from `stats`.
pub fn apply_delta(
    folders: &BTreeSet<String>,
    stats: &mut BTreeMap<String, FolderStats>,
    path: &str,
    kind: UnusedKind,
    bytes: u64,
    delta: Delta,
) {
    let containing = ancestor_folders(path)
        .chain(std::iter::once(path))
        .filter(|folder| folders.contains(*folder));

    for folder in containing {
        match delta {
            Delta::Add => {
                stats.entry(folder.to_string()).or_default().add(kind, bytes);
            }
            Delta::Subtract => {
                if let Some(entry) = stats.get_mut(folder) {
                    entry.subtract(kind, bytes);
                    if entry.is_empty() {
                        stats.remove(folder);
                    }
                }
            }
        }
    }
}
