//! CLI command implementations

use anyhow::bail;
use reclaim_core::{FolderStats, IndexState, index_cache_path};
use reclaim_indexer::{
    Collaborators, CycleOutcome, FsSizeProbe, GlobClassifier, IncrementalScheduler, Phase,
    ReclaimConfig, TextReferenceResolver, WalkPathSource, render_folder_report, top_folders,
};
use reclaim_watcher::{FileWatcher, apply_event};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Scheduler over the files under `root`, caching into `<root>/.reclaim/`.
pub fn build_scheduler(root: &Path, config: &ReclaimConfig) -> anyhow::Result<IncrementalScheduler> {
    let hosts = Collaborators {
        paths: Arc::new(WalkPathSource::new(root)),
        resolver: Arc::new(TextReferenceResolver::from_config(root, config)?),
        predicates: Arc::new(GlobClassifier::from_config(config)?),
        sizes: Arc::new(FsSizeProbe::new(root)),
    };
    Ok(IncrementalScheduler::new(hosts).with_cache(index_cache_path(root)))
}

/// Run one cycle to completion in budgeted slices, reporting each phase once.
pub async fn run_cycle(scheduler: &mut IncrementalScheduler, config: &ReclaimConfig) -> anyhow::Result<()> {
    scheduler.init()?;

    let budget = config.budget();
    let mut last_phase = None;
    while scheduler.process_incremental(budget) {
        let phase = scheduler.phase();
        if last_phase != Some(phase) {
            eprintln!("{}", scheduler.status());
            last_phase = Some(phase);
        }

        if phase == Phase::LoadingCache {
            tokio::time::sleep(Duration::from_millis(1)).await;
        } else {
            tokio::task::yield_now().await;
        }
    }

    if scheduler.last_outcome() == Some(CycleOutcome::Aborted) {
        match scheduler.last_error() {
            Some(e) => bail!("Index build aborted: {}", e),
            None => bail!("Index build aborted"),
        }
    }
    Ok(())
}

pub async fn index(root: PathBuf, config: ReclaimConfig) -> anyhow::Result<()> {
    tracing::info!("Indexing assets under: {}", root.display());

    let mut scheduler = build_scheduler(&root, &config)?;
    run_cycle(&mut scheduler, &config).await?;
    print_summary(scheduler.state());

    scheduler.flush_pending_save();
    Ok(())
}

#[derive(Serialize)]
struct FolderRow<'a> {
    folder: &'a str,
    #[serde(flatten)]
    stats: FolderStats,
}

pub async fn report(root: PathBuf, config: ReclaimConfig, top: usize, json: bool) -> anyhow::Result<()> {
    let mut scheduler = build_scheduler(&root, &config)?;
    run_cycle(&mut scheduler, &config).await?;
    let state = scheduler.state();

    if json {
        let rows: Vec<FolderRow> = top_folders(state, top)
            .into_iter()
            .map(|(folder, stats)| FolderRow { folder, stats })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!();
        println!("{}", "─".repeat(60));
        println!(" Reclaimable space by folder");
        println!("{}", "─".repeat(60));
        println!();

        let report = render_folder_report(state, top);
        if report.is_empty() {
            println!(" No unused assets found.");
        } else {
            println!("{}", report);
        }
        println!();
        print_summary(state);
    }

    scheduler.flush_pending_save();
    Ok(())
}

pub async fn watch(root: PathBuf, config: ReclaimConfig) -> anyhow::Result<()> {
    let mut scheduler = build_scheduler(&root, &config)?;
    run_cycle(&mut scheduler, &config).await?;
    print_summary(scheduler.state());

    let mut watcher = FileWatcher::new(&root)?;
    watcher.start()?;

    let mut ticker = tokio::time::interval(config.tick());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Reaps finished saves even when no cycle is running
                scheduler.process_incremental(config.budget());
                if scheduler.is_dirty() {
                    scheduler.save();
                    print_summary(scheduler.state());
                }
            }
            event = watcher.event_receiver().recv() => {
                let Some(event) = event else {
                    tracing::warn!("Watcher channel closed");
                    break;
                };
                apply_event(&mut scheduler, event);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopping watcher");
                break;
            }
        }
    }

    if scheduler.is_dirty() {
        scheduler.save();
    }
    scheduler.flush_pending_save();
    Ok(())
}

pub fn clear(root: PathBuf) -> anyhow::Result<()> {
    tracing::info!("Clearing cache for: {}", root.display());

    reclaim_core::clear_cache(&root)?;

    tracing::info!("Cache cleared");
    Ok(())
}

fn print_summary(state: &IndexState) {
    let totals = state.totals();
    println!(
        " {} unused files, {} unused scenes, {} reclaimable",
        totals.file_count,
        totals.scene_count,
        format_size(totals.total_bytes)
    );
}

fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
