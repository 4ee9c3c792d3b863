//! Cooperative, time-budgeted index builder
//!
//! A build cycle is a fixed sequence of phases, each walking an explicit
//! cursor over a list. [`IncrementalScheduler::process_incremental`] runs
//! elements until the budget is spent and returns, so the host can call it
//! once per tick without ever blocking. Cache I/O happens on worker threads.
//!
//! Queries always read the last completed generation; a cycle in progress
//! builds into a private working state that is swapped in when it finishes.

use crate::background::{BackgroundTask, TaskStatus};
use reclaim_core::cache::{self, CacheSnapshot};
use reclaim_core::{
    AssetClassifier, CacheError, DependencyResolver, Fingerprint, FolderStats, IndexError,
    IndexState, PathSource, SizeProbe, UnusedClassifier, UnusedKind, aggregate_folder,
    register_folders,
};
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// One resumable stage of a build cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Idle; also the state before the first [`IncrementalScheduler::init`].
    Done,
    LoadingCache,
    FilteringPaths,
    BuildingGraph,
    ClassifyingUnused,
    SizingFiles,
    SizingScenes,
    AggregatingFolders,
}

impl Phase {
    /// Short human-readable name.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Done => "Idle",
            Phase::LoadingCache => "Loading cache",
            Phase::FilteringPaths => "Filtering paths",
            Phase::BuildingGraph => "Resolving dependencies",
            Phase::ClassifyingUnused => "Finding unused assets",
            Phase::SizingFiles => "Measuring unused files",
            Phase::SizingScenes => "Measuring unused scenes",
            Phase::AggregatingFolders => "Aggregating folders",
        }
    }

    fn next(self) -> Phase {
        match self {
            Phase::LoadingCache => Phase::FilteringPaths,
            Phase::FilteringPaths => Phase::BuildingGraph,
            Phase::BuildingGraph => Phase::ClassifyingUnused,
            Phase::ClassifyingUnused => Phase::SizingFiles,
            Phase::SizingFiles => Phase::SizingScenes,
            Phase::SizingScenes => Phase::AggregatingFolders,
            Phase::AggregatingFolders | Phase::Done => Phase::Done,
        }
    }
}

/// How the most recent cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The cached generation matched and was adopted as is.
    CacheHit,
    /// The graph was built from scratch.
    Rebuilt,
    /// An invariant check failed; nothing was published.
    Aborted,
}

/// Host collaborators used by a build.
#[derive(Clone)]
pub struct Collaborators {
    pub paths: Arc<dyn PathSource>,
    pub resolver: Arc<dyn DependencyResolver>,
    pub predicates: Arc<dyn AssetClassifier>,
    pub sizes: Arc<dyn SizeProbe>,
}

/// Cursor state of one in-flight cycle. Plain data, safe to pause between
/// any two elements.
#[derive(Debug)]
struct BuildCycle {
    fingerprint: Fingerprint,
    raw_paths: Vec<String>,
    seen: HashSet<String>,
    paths: Vec<String>,
    working: IndexState,
    nodes: Vec<String>,
    file_candidates: Vec<String>,
    scene_candidates: Vec<String>,
    folders: Vec<String>,
    cursor: usize,
    started: Instant,
}

impl BuildCycle {
    fn new(fingerprint: Fingerprint, raw_paths: Vec<String>) -> Self {
        Self {
            fingerprint,
            raw_paths,
            seen: HashSet::new(),
            paths: Vec::new(),
            working: IndexState::new(),
            nodes: Vec::new(),
            file_candidates: Vec::new(),
            scene_candidates: Vec::new(),
            folders: Vec::new(),
            cursor: 0,
            started: Instant::now(),
        }
    }

    fn total(&self, phase: Phase) -> usize {
        match phase {
            Phase::FilteringPaths => self.raw_paths.len(),
            Phase::BuildingGraph => self.paths.len(),
            Phase::ClassifyingUnused => self.nodes.len(),
            Phase::SizingFiles => self.file_candidates.len(),
            Phase::SizingScenes => self.scene_candidates.len(),
            Phase::AggregatingFolders => self.folders.len(),
            Phase::Done | Phase::LoadingCache => 0,
        }
    }
}

/// Drives index build cycles and answers queries about the latest generation.
pub struct IncrementalScheduler {
    hosts: Collaborators,
    classifier: UnusedClassifier,
    cache_path: Option<PathBuf>,
    phase: Phase,
    cycle: Option<BuildCycle>,
    pending_load: Option<BackgroundTask<Option<CacheSnapshot>>>,
    pending_save: Option<BackgroundTask<bool>>,
    published: IndexState,
    fingerprint: Option<Fingerprint>,
    generation: u64,
    last_outcome: Option<CycleOutcome>,
    last_error: Option<IndexError>,
    dirty: bool,
}

impl std::fmt::Debug for IncrementalScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalScheduler")
            .field("phase", &self.phase)
            .field("generation", &self.generation)
            .field("cache_path", &self.cache_path)
            .field("published", &self.published.graph)
            .finish()
    }
}

impl IncrementalScheduler {
    /// Create an idle scheduler with no cache file.
    pub fn new(hosts: Collaborators) -> Self {
        let classifier = UnusedClassifier::new(hosts.predicates.clone(), hosts.sizes.clone());
        Self {
            hosts,
            classifier,
            cache_path: None,
            phase: Phase::Done,
            cycle: None,
            pending_load: None,
            pending_save: None,
            published: IndexState::new(),
            fingerprint: None,
            generation: 0,
            last_outcome: None,
            last_error: None,
            dirty: false,
        }
    }

    /// Persist generations to (and restore them from) `path`.
    pub fn with_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Start a new cycle: snapshot the path source and begin loading the cache.
    pub fn init(&mut self) -> Result<(), IndexError> {
        if self.phase != Phase::Done {
            return Err(IndexError::Busy {
                phase: self.phase.label(),
            });
        }

        let raw_paths = self.hosts.paths.enumerate_paths();
        let path_count = u32::try_from(raw_paths.len()).unwrap_or(u32::MAX);
        let fingerprint = Fingerprint::new(path_count, cache::CACHE_FORMAT_VERSION);

        self.pending_load = self.cache_path.clone().and_then(spawn_cache_load);
        self.cycle = Some(BuildCycle::new(fingerprint, raw_paths));
        self.last_error = None;
        self.phase = Phase::LoadingCache;

        info!("Index cycle started: {} candidate paths", path_count);
        Ok(())
    }

    /// Advance the current cycle for at most `budget` of wall-clock time.
    ///
    /// At least one element is processed per call. Returns true while work
    /// remains.
    pub fn process_incremental(&mut self, budget: Duration) -> bool {
        let started = Instant::now();
        self.run(|_| started.elapsed() >= budget)
    }

    /// Advance the current cycle by at most `steps` elements.
    pub fn process_steps(&mut self, steps: usize) -> bool {
        let steps = steps.max(1);
        self.run(|processed| processed >= steps)
    }

    /// Abandon the current cycle. Nothing from it is published or saved.
    pub fn cancel(&mut self) {
        if self.phase == Phase::Done {
            return;
        }
        info!("Index cycle cancelled during {}", self.phase.label());
        self.cycle = None;
        self.pending_load = None;
        self.phase = Phase::Done;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase != Phase::Done
    }

    /// (processed, total) for the current phase.
    pub fn progress_counts(&self) -> (usize, usize) {
        match (&self.cycle, self.phase) {
            (_, Phase::Done | Phase::LoadingCache) | (None, _) => (0, 0),
            (Some(cycle), phase) => (cycle.cursor, cycle.total(phase)),
        }
    }

    /// Fraction of the current phase completed, in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        match self.phase {
            Phase::Done => 1.0,
            Phase::LoadingCache => 0.0,
            _ => {
                let (done, total) = self.progress_counts();
                if total == 0 {
                    1.0
                } else {
                    (done as f32 / total as f32).min(1.0)
                }
            }
        }
    }

    /// Status line naming the current phase.
    pub fn status(&self) -> String {
        match self.phase {
            Phase::Done | Phase::LoadingCache => format!("{}…", self.phase.label()),
            phase => {
                let (done, total) = self.progress_counts();
                format!("{}… {}/{}", phase.label(), done, total)
            }
        }
    }

    // ── Queries (latest completed generation) ───────────────

    pub fn is_unused(&self, path: &str) -> bool {
        self.published.is_unused(path)
    }

    pub fn unused_bytes(&self, path: &str) -> Option<u64> {
        self.published.unused_bytes(path)
    }

    pub fn folder_stats(&self, folder: &str) -> Option<FolderStats> {
        self.published.folder_stats(folder)
    }

    pub fn state(&self) -> &IndexState {
        &self.published
    }

    /// Number of generations published so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_outcome(&self) -> Option<CycleOutcome> {
        self.last_outcome
    }

    pub fn last_error(&self) -> Option<&IndexError> {
        self.last_error.as_ref()
    }

    /// True when change notifications have altered the generation since it
    /// was last saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ── Single-path change events ───────────────────────────

    /// Re-resolve one path after it was created or its contents changed.
    pub fn notify_created_or_changed(&mut self, path: &str) {
        let deps = resolve_or_empty(self.hosts.resolver.as_ref(), path);
        let state = &mut self.published;

        let is_new = !state.graph.contains(path);
        let mut affected: BTreeSet<String> = state.graph.add_or_update(path, deps);
        if let Some(current) = state.graph.dependencies(path) {
            affected.extend(current.iter().cloned());
        }
        affected.insert(path.to_string());
        state.track_folders(path);

        for touched in &affected {
            state.reclassify(touched, &self.classifier);
        }

        if is_new {
            self.adjust_path_count(1);
        }
        self.dirty = true;
        debug!("Updated {} ({} paths reclassified)", path, affected.len());
    }

    /// Drop a deleted path from the index.
    ///
    /// When `path` is not indexed itself but names a known folder, every
    /// indexed path beneath it goes too.
    pub fn notify_removed(&mut self, path: &str) {
        if self.remove_one(path) {
            return;
        }

        let beneath = self.indexed_beneath(path);
        if beneath.is_empty() {
            debug!("Ignoring removal of unindexed path {}", path);
            return;
        }
        for child in &beneath {
            self.remove_one(child);
        }
        debug!("Removed folder {} ({} paths)", path, beneath.len());
    }

    /// Move a path, keeping its edges.
    ///
    /// A known folder moves every indexed path beneath it. Anything else
    /// the index has never seen is treated as a fresh creation at `new_path`.
    pub fn notify_renamed(&mut self, old_path: &str, new_path: &str) {
        if self.published.graph.contains(old_path) {
            self.rename_one(old_path, new_path);
            return;
        }

        let beneath = self.indexed_beneath(old_path);
        if beneath.is_empty() {
            debug!("Rename source {} not indexed; treating {} as new", old_path, new_path);
            self.notify_created_or_changed(new_path);
            return;
        }
        for child in &beneath {
            let moved = format!("{}{}", new_path, &child[old_path.len()..]);
            self.rename_one(child, &moved);
        }
        debug!("Renamed folder {} -> {} ({} paths)", old_path, new_path, beneath.len());
    }

    fn remove_one(&mut self, path: &str) -> bool {
        let state = &mut self.published;
        let Some(former_deps) = state.graph.remove(path) else {
            return false;
        };

        state.forget(path);
        state.prune_folders(path);
        for dep in &former_deps {
            state.reclassify(dep, &self.classifier);
        }

        self.adjust_path_count(-1);
        self.dirty = true;
        debug!("Removed {} ({} former dependencies reclassified)", path, former_deps.len());
        true
    }

    fn rename_one(&mut self, old_path: &str, new_path: &str) {
        let state = &mut self.published;
        // Landing on an indexed path folds two nodes into one
        let merged = old_path != new_path && state.graph.contains(new_path);

        state.forget(old_path);
        state.graph.replace(old_path, new_path);
        state.prune_folders(old_path);
        state.track_folders(new_path);
        state.reclassify(new_path, &self.classifier);

        if merged {
            self.adjust_path_count(-1);
        }
        self.dirty = true;
        debug!("Renamed {} -> {}", old_path, new_path);
    }

    /// Indexed paths strictly inside `folder`, or nothing when the folder is unknown.
    fn indexed_beneath(&self, folder: &str) -> Vec<String> {
        let state = &self.published;
        if !state.folders.contains(folder) {
            return Vec::new();
        }
        state.graph.paths_under(folder).cloned().collect()
    }

    fn adjust_path_count(&mut self, delta: i32) {
        if let Some(fingerprint) = self.fingerprint.as_mut() {
            fingerprint.path_count = fingerprint.path_count.saturating_add_signed(delta);
        }
    }

    // ── Persistence ─────────────────────────────────────────

    /// Write the current generation to the cache file in the background.
    ///
    /// The worker gets its own copy of the state, so later mutations never
    /// leak into the file being written.
    pub fn save(&mut self) -> bool {
        let (Some(path), Some(fingerprint)) = (self.cache_path.clone(), self.fingerprint.clone()) else {
            return false;
        };
        let snapshot = self.published.clone();
        // Saves land in call order: each worker waits for its predecessor
        let previous = self.pending_save.take();

        let task = BackgroundTask::spawn("reclaim-cache-save", move || {
            if let Some(previous) = previous {
                previous.wait();
            }
            match cache::save_index(&path, &fingerprint, &snapshot) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to save index cache {}: {}", path.display(), e);
                    false
                }
            }
        });

        match task {
            Ok(task) => {
                self.pending_save = Some(task);
                self.dirty = false;
                true
            }
            Err(e) => {
                warn!("Cannot start cache save worker: {}", e);
                false
            }
        }
    }

    /// Block until the most recent save finishes. Meant for shutdown.
    pub fn flush_pending_save(&mut self) -> Option<bool> {
        self.pending_save.take().and_then(BackgroundTask::wait)
    }

    // ── State machine ───────────────────────────────────────

    fn run(&mut self, mut should_yield: impl FnMut(usize) -> bool) -> bool {
        self.poll_save();

        let mut processed = 0;
        loop {
            match self.phase {
                Phase::Done => return false,
                Phase::LoadingCache => {
                    if !self.poll_cache_load() {
                        return true;
                    }
                    continue;
                }
                _ => {}
            }

            self.step();
            processed += 1;

            if self.phase == Phase::Done {
                return false;
            }
            if should_yield(processed) {
                return true;
            }
        }
    }

    /// Returns false while the load is still in flight.
    fn poll_cache_load(&mut self) -> bool {
        let loaded = match self.pending_load.as_mut() {
            None => None,
            Some(task) => match task.poll() {
                TaskStatus::Pending => return false,
                TaskStatus::Ready(snapshot) => snapshot,
                TaskStatus::Lost => {
                    warn!("Cache load worker {} exited without a result", task.name());
                    None
                }
            },
        };
        self.pending_load = None;

        let Some(live) = self.cycle.as_ref().map(|cycle| cycle.fingerprint.clone()) else {
            self.phase = Phase::Done;
            return true;
        };

        match loaded {
            Some(snapshot) if snapshot.fingerprint == live => {
                if let Err(e) = snapshot.state.graph.verify_mirror() {
                    warn!("Cached index is inconsistent ({}); rebuilding", e);
                    self.enter(Phase::FilteringPaths);
                    return true;
                }
                self.adopt(snapshot);
            }
            Some(snapshot) => {
                info!(
                    "Index cache is stale (cached {} paths / {}, live {} paths / {}); rebuilding",
                    snapshot.fingerprint.path_count,
                    snapshot.fingerprint.version,
                    live.path_count,
                    live.version
                );
                self.enter(Phase::FilteringPaths);
            }
            None => self.enter(Phase::FilteringPaths),
        }
        true
    }

    fn adopt(&mut self, snapshot: CacheSnapshot) {
        let elapsed = self.cycle.take().map(|cycle| cycle.started.elapsed());
        info!(
            "Index restored from cache: {} nodes, {} unused files, {} unused scenes ({:?})",
            snapshot.state.graph.node_count(),
            snapshot.state.unused_files.len(),
            snapshot.state.unused_scenes.len(),
            elapsed.unwrap_or_default()
        );

        self.published = snapshot.state;
        self.fingerprint = Some(snapshot.fingerprint);
        self.generation += 1;
        self.last_outcome = Some(CycleOutcome::CacheHit);
        self.dirty = false;
        self.phase = Phase::Done;
    }

    /// Process one element of the current phase.
    fn step(&mut self) {
        let phase = self.phase;
        let Some(cycle) = self.cycle.as_mut() else {
            self.phase = Phase::Done;
            return;
        };

        let total = cycle.total(phase);
        if cycle.cursor < total {
            let index = cycle.cursor;
            cycle.cursor += 1;

            match phase {
                Phase::FilteringPaths => {
                    let path = std::mem::take(&mut cycle.raw_paths[index]);
                    if !path.is_empty() && cycle.seen.insert(path.clone()) {
                        register_folders(&mut cycle.working.folders, &path);
                        cycle.paths.push(path);
                    }
                }
                Phase::BuildingGraph => {
                    let path = &cycle.paths[index];
                    let deps = resolve_or_empty(self.hosts.resolver.as_ref(), path);
                    cycle.working.graph.add_or_update(path, deps);
                }
                Phase::ClassifyingUnused => {
                    let path = &cycle.nodes[index];
                    match self.classifier.classify(&cycle.working.graph, path) {
                        Some(UnusedKind::File) => cycle.file_candidates.push(path.clone()),
                        Some(UnusedKind::Scene) => cycle.scene_candidates.push(path.clone()),
                        None => {}
                    }
                }
                Phase::SizingFiles => {
                    let path = &cycle.file_candidates[index];
                    let bytes = self.classifier.measure(path);
                    cycle.working.insert_unused(path.clone(), UnusedKind::File, bytes);
                }
                Phase::SizingScenes => {
                    let path = &cycle.scene_candidates[index];
                    let bytes = self.classifier.measure(path);
                    cycle.working.insert_unused(path.clone(), UnusedKind::Scene, bytes);
                }
                Phase::AggregatingFolders => {
                    let folder = &cycle.folders[index];
                    let stats = aggregate_folder(
                        folder,
                        &cycle.working.unused_files,
                        &cycle.working.unused_scenes,
                    );
                    if !stats.is_empty() {
                        cycle.working.folder_stats.insert(folder.clone(), stats);
                    }
                }
                Phase::Done | Phase::LoadingCache => {}
            }
        }

        if cycle.cursor >= total {
            self.finish_phase();
        }
    }

    /// Prepare the next phase's work list once the current cursor is exhausted.
    fn finish_phase(&mut self) {
        let phase = self.phase;
        let Some(cycle) = self.cycle.as_mut() else {
            self.phase = Phase::Done;
            return;
        };

        match phase {
            Phase::FilteringPaths => {
                cycle.paths.sort();
                cycle.raw_paths = Vec::new();
                cycle.seen = HashSet::new();
            }
            Phase::BuildingGraph => {
                if let Err(e) = cycle.working.graph.verify_mirror() {
                    self.abort(e);
                    return;
                }
                cycle.nodes = cycle.working.graph.paths().cloned().collect();
            }
            Phase::SizingScenes => {
                cycle.folders = cycle.working.folders.iter().cloned().collect();
            }
            Phase::AggregatingFolders => {
                self.complete();
                return;
            }
            _ => {}
        }

        self.enter(phase.next());
    }

    fn enter(&mut self, phase: Phase) {
        if let Some(cycle) = self.cycle.as_mut() {
            cycle.cursor = 0;
            debug!("Entering {} ({} items)", phase.label(), cycle.total(phase));
        }
        self.phase = phase;
    }

    fn complete(&mut self) {
        let Some(cycle) = self.cycle.take() else {
            self.phase = Phase::Done;
            return;
        };

        info!(
            "Index built: {} nodes, {} edges, {} unused files, {} unused scenes in {:?}",
            cycle.working.graph.node_count(),
            cycle.working.graph.edge_count(),
            cycle.working.unused_files.len(),
            cycle.working.unused_scenes.len(),
            cycle.started.elapsed()
        );

        self.published = cycle.working;
        self.fingerprint = Some(cycle.fingerprint);
        self.generation += 1;
        self.last_outcome = Some(CycleOutcome::Rebuilt);
        self.dirty = false;
        self.phase = Phase::Done;
        self.save();
    }

    fn abort(&mut self, err: IndexError) {
        error!("Index cycle aborted: {}", err);
        self.cycle = None;
        self.pending_load = None;
        self.last_error = Some(err);
        self.last_outcome = Some(CycleOutcome::Aborted);
        self.phase = Phase::Done;
    }

    fn poll_save(&mut self) {
        let Some(task) = self.pending_save.as_mut() else {
            return;
        };
        match task.poll() {
            TaskStatus::Pending => {}
            TaskStatus::Ready(saved) => {
                debug!("Cache save finished (saved: {})", saved);
                self.pending_save = None;
            }
            TaskStatus::Lost => {
                warn!("Cache save worker exited without a result");
                self.pending_save = None;
            }
        }
    }
}

fn resolve_or_empty(resolver: &dyn DependencyResolver, path: &str) -> Vec<String> {
    match resolver.resolve(path) {
        Ok(deps) => deps,
        Err(e) => {
            warn!("Cannot resolve dependencies of {}: {:#}", path, e);
            Vec::new()
        }
    }
}

fn spawn_cache_load(path: PathBuf) -> Option<BackgroundTask<Option<CacheSnapshot>>> {
    let task = BackgroundTask::spawn("reclaim-cache-load", move || match cache::load_index(&path) {
        Ok(snapshot) => Some(snapshot),
        Err(CacheError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No index cache at {}", path.display());
            None
        }
        Err(e) => {
            warn!("Failed to load index cache {}: {}", path.display(), e);
            None
        }
    });

    match task {
        Ok(task) => Some(task),
        Err(e) => {
            warn!("Cannot start cache load worker: {}", e);
            None
        }
    }
}
