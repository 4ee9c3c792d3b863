//! Folder report rendering

use reclaim_core::{FolderStats, IndexState};

/// Folders ordered by reclaimable bytes (largest first, then by path).
pub fn top_folders(state: &IndexState, limit: usize) -> Vec<(&str, FolderStats)> {
    let mut rows: Vec<(&str, FolderStats)> = state
        .folder_stats
        .iter()
        .map(|(folder, stats)| (folder.as_str(), *stats))
        .collect();

    rows.sort_by(|a, b| b.1.total_bytes.cmp(&a.1.total_bytes).then_with(|| a.0.cmp(b.0)));
    rows.truncate(limit);
    rows
}

/// One line per folder: path, unused counts and reclaimable bytes.
pub fn render_folder_report(state: &IndexState, limit: usize) -> String {
    let rows = top_folders(state, limit);
    let width = rows.iter().map(|(folder, _)| folder.len()).max().unwrap_or(0);

    rows.iter()
        .map(|(folder, stats)| {
            format!(
                "{folder:<width$}  {} files  {} scenes  {} bytes",
                stats.file_count, stats.scene_count, stats.total_bytes
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
