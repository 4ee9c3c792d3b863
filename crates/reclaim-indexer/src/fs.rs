//! Filesystem-backed collaborators

use crate::config::ReclaimConfig;
use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use reclaim_core::{AssetClassifier, AssetPath, PathSource, SizeProbe};
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Root-relative, `/`-delimited form of `path`.
///
/// Returns None for paths outside `root`, the root itself, or non-UTF-8 names.
pub fn relative_asset_path(root: &Path, path: &Path) -> Option<AssetPath> {
    let relative = path.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .map(|component| match component {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<&str>>>()?;

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Enumerates every non-hidden file under a root, honouring `.gitignore`.
#[derive(Debug, Clone)]
pub struct WalkPathSource {
    root: PathBuf,
}

impl WalkPathSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PathSource for WalkPathSource {
    fn enumerate_paths(&self) -> Vec<AssetPath> {
        let mut paths = Vec::new();

        for entry in WalkBuilder::new(&self.root).hidden(true).build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Cannot read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|kind| kind.is_file()) {
                continue;
            }
            if let Some(path) = relative_asset_path(&self.root, entry.path()) {
                paths.push(path);
            }
        }

        tracing::debug!("Enumerated {} paths under {}", paths.len(), self.root.display());
        paths
    }
}

/// `StatBytes` against files under a root.
#[derive(Debug, Clone)]
pub struct FsSizeProbe {
    root: PathBuf,
}

impl FsSizeProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SizeProbe for FsSizeProbe {
    fn stat_bytes(&self, path: &str) -> std::io::Result<u64> {
        Ok(std::fs::metadata(self.root.join(path))?.len())
    }
}

/// Ignore and container predicates driven by glob lists.
#[derive(Debug, Clone)]
pub struct GlobClassifier {
    ignore: GlobSet,
    containers: GlobSet,
}

impl GlobClassifier {
    pub fn new(ignore: &[String], containers: &[String]) -> Result<Self> {
        Ok(Self {
            ignore: build_globset(ignore)?,
            containers: build_globset(containers)?,
        })
    }

    pub fn from_config(config: &ReclaimConfig) -> Result<Self> {
        Self::new(&config.ignore, &config.containers)
    }
}

impl AssetClassifier for GlobClassifier {
    fn is_ignored(&self, path: &str) -> bool {
        self.ignore.is_match(path)
    }

    fn is_container_kind(&self, path: &str) -> bool {
        self.containers.is_match(path)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).with_context(|| format!("Invalid glob pattern: {pattern}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
