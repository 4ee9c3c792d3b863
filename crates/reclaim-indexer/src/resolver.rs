//! Text-scanning dependency resolver
//!
//! Looks for path-like tokens (`Art/hero.png`, `../Materials/hero.mat`) in
//! text assets and keeps those that name an existing file, trying each token
//! relative to the referencing file's folder first and then to the root.

use crate::config::ReclaimConfig;
use anyhow::{Context, Result};
use reclaim_core::{AssetPath, DependencyResolver};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

const REFERENCE_PATTERN: &str = r"[\w@.\-]+(?:/[\w@.\-]+)*\.[A-Za-z0-9]+";

pub struct TextReferenceResolver {
    root: PathBuf,
    extensions: HashSet<String>,
    max_bytes: u64,
    pattern: Regex,
}

impl TextReferenceResolver {
    pub fn new(root: impl Into<PathBuf>, extensions: &[String], max_bytes: u64) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            extensions: extensions.iter().map(|ext| ext.to_ascii_lowercase()).collect(),
            max_bytes,
            pattern: Regex::new(REFERENCE_PATTERN)?,
        })
    }

    pub fn from_config(root: impl Into<PathBuf>, config: &ReclaimConfig) -> Result<Self> {
        Self::new(root, &config.reference_extensions, config.max_reference_file_bytes)
    }

    /// Whether files like `path` are scanned at all.
    pub fn scans(&self, path: &str) -> bool {
        let name = path.rsplit('/').next().unwrap_or(path);
        name.rsplit_once('.')
            .is_some_and(|(_, ext)| self.extensions.contains(&ext.to_ascii_lowercase()))
    }

    /// Existing files referenced from `text`, which is the content of `path`.
    pub fn extract_references(&self, path: &str, text: &str) -> Vec<AssetPath> {
        let folder = path.rsplit_once('/').map_or("", |(folder, _)| folder);
        let mut found = BTreeSet::new();

        for token in self.pattern.find_iter(text) {
            let token = token.as_str();
            let candidates = [join_relative(folder, token), join_relative("", token)];
            let hit = candidates
                .into_iter()
                .flatten()
                .find(|candidate| candidate != path && self.root.join(candidate).is_file());
            if let Some(hit) = hit {
                found.insert(hit);
            }
        }

        found.into_iter().collect()
    }
}

impl DependencyResolver for TextReferenceResolver {
    fn resolve(&self, path: &str) -> Result<Vec<AssetPath>> {
        if !self.scans(path) {
            return Ok(Vec::new());
        }

        let full = self.root.join(path);
        let size = std::fs::metadata(&full)
            .with_context(|| format!("Cannot stat {}", full.display()))?
            .len();
        if size > self.max_bytes {
            tracing::debug!("Skipping {} ({} bytes over scan limit)", path, size);
            return Ok(Vec::new());
        }

        let bytes = std::fs::read(&full).with_context(|| format!("Cannot read {}", full.display()))?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(self.extract_references(path, &text))
    }
}

/// Resolve `token` against `folder`, collapsing `.` and `..`.
///
/// Returns None when the result would climb above the root.
fn join_relative(folder: &str, token: &str) -> Option<String> {
    let mut parts: Vec<&str> = folder.split('/').filter(|part| !part.is_empty()).collect();
    for part in token.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            part => parts.push(part),
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_relative() {
        assert_eq!(join_relative("Assets/Scenes", "../Art/hero.png").as_deref(), Some("Assets/Art/hero.png"));
        assert_eq!(join_relative("Assets", "./hero.png").as_deref(), Some("Assets/hero.png"));
        assert_eq!(join_relative("", "Assets/hero.png").as_deref(), Some("Assets/hero.png"));
        assert_eq!(join_relative("", "../escape.png"), None);
    }
}
