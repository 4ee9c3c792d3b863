//! Filesystem watcher implementation

use anyhow::Result;
use ignore::WalkBuilder;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use reclaim_core::AssetPath;
use reclaim_indexer::{IncrementalScheduler, relative_asset_path};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Root-relative change events emitted by the file watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// File created
    Created(AssetPath),
    /// File contents changed
    Modified(AssetPath),
    /// File or folder removed
    Removed(AssetPath),
    /// File moved within the watched tree
    Renamed { from: AssetPath, to: AssetPath },
}

impl WatchEvent {
    /// The path the event leaves behind.
    pub fn path(&self) -> &str {
        match self {
            WatchEvent::Created(path) | WatchEvent::Modified(path) | WatchEvent::Removed(path) => path,
            WatchEvent::Renamed { to, .. } => to,
        }
    }
}

/// Recursive watcher over one asset root
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
    root_path: PathBuf,
}

impl FileWatcher {
    /// Create a watcher for `root_path`. Nothing is watched until [`FileWatcher::start`].
    pub fn new(root_path: impl AsRef<Path>) -> Result<Self> {
        // Backends report canonical paths
        let root_path = root_path
            .as_ref()
            .canonicalize()
            .unwrap_or_else(|_| root_path.as_ref().to_path_buf());
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let scope = WatchScope::new(root_path.clone());
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                debug!("File system event: {:?}", event);
                for watch_event in scope.translate(event) {
                    if let Err(e) = event_tx.send(watch_event) {
                        warn!("Failed to forward watch event: {}", e);
                    }
                }
            }
            Err(e) => {
                error!("File system watch error: {}", e);
            }
        })?;

        Ok(Self {
            watcher,
            event_rx,
            root_path,
        })
    }

    /// Watch the root directory recursively
    pub fn start(&mut self) -> Result<()> {
        self.watcher.watch(&self.root_path, RecursiveMode::Recursive)?;
        info!("Watching directory: {}", self.root_path.display());
        Ok(())
    }

    /// Get the event receiver
    pub fn event_receiver(&mut self) -> &mut mpsc::UnboundedReceiver<WatchEvent> {
        &mut self.event_rx
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }
}

/// The slice of the filesystem the index covers.
///
/// Agrees with [`reclaim_indexer::WalkPathSource`]: hidden entries are
/// skipped, `.ignore` files always apply, and `.gitignore` plus
/// `.git/info/exclude` apply inside a git checkout.
#[derive(Debug, Clone)]
pub struct WatchScope {
    root: PathBuf,
    in_git_repo: bool,
}

impl WatchScope {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let in_git_repo = root.ancestors().any(|dir| dir.join(".git").exists());
        Self { root, in_git_repo }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root-relative asset path for `path`, or None when the index would not
    /// enumerate it.
    pub fn asset_path(&self, path: &Path, is_dir: bool) -> Option<AssetPath> {
        let asset = relative_asset_path(&self.root, path)?;
        if is_hidden(&asset) || self.is_ignored(path, is_dir) {
            return None;
        }
        Some(asset)
    }

    /// Convert one backend event into root-relative watch events.
    ///
    /// Directory events expand into one event per file beneath them; a
    /// directory that leaves (or moves within) the tree is also reported as
    /// removed so the index can sweep whatever it still holds under the old
    /// prefix.
    pub fn translate(&self, event: notify::Event) -> Vec<WatchEvent> {
        match event.kind {
            EventKind::Create(_) => event
                .paths
                .iter()
                .flat_map(|path| self.arrivals(path))
                .collect(),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
                self.moved(&event.paths[0], &event.paths[1])
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) | EventKind::Remove(_) => event
                .paths
                .iter()
                .filter_map(|path| self.asset_path(path, false))
                .map(WatchEvent::Removed)
                .collect(),
            EventKind::Modify(ModifyKind::Name(_)) => event
                .paths
                .iter()
                .flat_map(|path| {
                    if path.exists() {
                        self.arrivals(path)
                    } else {
                        self.asset_path(path, false).map(WatchEvent::Removed).into_iter().collect()
                    }
                })
                .collect(),
            EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
            EventKind::Modify(_) => event
                .paths
                .iter()
                .filter(|path| !path.is_dir())
                .filter_map(|path| self.asset_path(path, false))
                .map(WatchEvent::Modified)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// A file or directory that appeared at `path`.
    fn arrivals(&self, path: &Path) -> Vec<WatchEvent> {
        if !path.is_dir() {
            return self.asset_path(path, false).map(WatchEvent::Created).into_iter().collect();
        }
        if self.asset_path(path, true).is_none() {
            return Vec::new();
        }
        self.files_within(path)
            .iter()
            .filter_map(|file| self.asset_path(file, false))
            .map(WatchEvent::Created)
            .collect()
    }

    fn moved(&self, from: &Path, to: &Path) -> Vec<WatchEvent> {
        let is_dir = to.is_dir();
        match (self.asset_path(from, is_dir), self.asset_path(to, is_dir)) {
            (Some(from), Some(to)) if !is_dir => vec![WatchEvent::Renamed { from, to }],
            (Some(old_dir), Some(_)) => {
                let mut events: Vec<WatchEvent> = self
                    .files_within(to)
                    .iter()
                    .filter_map(|file| {
                        let suffix = relative_asset_path(to, file)?;
                        let landed = self.asset_path(file, false)?;
                        Some(WatchEvent::Renamed {
                            from: format!("{}/{}", old_dir, suffix),
                            to: landed,
                        })
                    })
                    .collect();
                events.push(WatchEvent::Removed(old_dir));
                events
            }
            (Some(from), None) => vec![WatchEvent::Removed(from)],
            (None, Some(_)) => self.arrivals(to),
            (None, None) => Vec::new(),
        }
    }

    fn files_within(&self, dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in WalkBuilder::new(dir).hidden(true).build() {
            match entry {
                Ok(entry) if entry.file_type().is_some_and(|kind| kind.is_file()) => {
                    files.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => warn!("Cannot read entry: {}", e),
            }
        }
        files
    }

    fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        // The nearest ignore file with an opinion wins
        for dir in path.ancestors().skip(1) {
            if !dir.starts_with(&self.root) {
                break;
            }
            let Ok(relative) = path.strip_prefix(dir) else {
                break;
            };
            let matcher = self.matcher_for(dir);
            let matched = matcher.matched_path_or_any_parents(relative, is_dir);
            if matched.is_ignore() {
                return true;
            }
            if matched.is_whitelist() {
                return false;
            }
        }
        false
    }

    /// Ignore rules declared in `dir`, lowest precedence first.
    fn matcher_for(&self, dir: &Path) -> Gitignore {
        let mut sources = Vec::new();
        if self.in_git_repo {
            if dir == self.root {
                sources.push(dir.join(".git").join("info").join("exclude"));
            }
            sources.push(dir.join(".gitignore"));
        }
        sources.push(dir.join(".ignore"));

        let mut builder = GitignoreBuilder::new(dir);
        for source in sources.iter().filter(|source| source.is_file()) {
            if let Some(e) = builder.add(source) {
                warn!("Cannot read {}: {}", source.display(), e);
            }
        }
        builder.build().unwrap_or_else(|e| {
            warn!("Invalid ignore rules in {}: {}", dir.display(), e);
            Gitignore::empty()
        })
    }
}

/// Feed one watch event into the live index.
pub fn apply_event(scheduler: &mut IncrementalScheduler, event: WatchEvent) {
    debug!("Applying watch event: {:?}", event);
    match event {
        WatchEvent::Created(path) | WatchEvent::Modified(path) => {
            scheduler.notify_created_or_changed(&path);
        }
        WatchEvent::Removed(path) => scheduler.notify_removed(&path),
        WatchEvent::Renamed { from, to } => scheduler.notify_renamed(&from, &to),
    }
}

fn is_hidden(path: &str) -> bool {
    path.split('/').any(|segment| segment.starts_with('.'))
}
