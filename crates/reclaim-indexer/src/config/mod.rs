//! Project configuration (`.reclaim.toml`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Config file looked up at the repository root.
pub const CONFIG_FILE: &str = ".reclaim.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReclaimConfig {
    /// Globs never reported as unused.
    pub ignore: Vec<String>,
    /// Globs for container ("scene") assets, tallied separately.
    pub containers: Vec<String>,
    /// Extensions whose text is scanned for references.
    pub reference_extensions: Vec<String>,
    /// Files above this size are not scanned.
    pub max_reference_file_bytes: u64,
    /// Time budget per scheduler tick, in milliseconds.
    pub budget_ms: u64,
    /// Interval between ticks in watch mode, in milliseconds.
    pub tick_ms: u64,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            ignore: vec![".git/**".into(), ".reclaim/**".into(), "target/**".into()],
            containers: vec!["**/*.unity".into(), "**/*.scene".into(), "**/*.tscn".into()],
            reference_extensions: [
                "unity", "prefab", "mat", "asset", "scene", "tscn", "tres", "json", "yaml", "yml",
                "toml", "xml", "html", "css", "js", "ts", "md",
            ]
            .iter()
            .map(|ext| ext.to_string())
            .collect(),
            max_reference_file_bytes: 4 * 1024 * 1024,
            budget_ms: 16,
            tick_ms: 50,
        }
    }
}

impl ReclaimConfig {
    /// Load `<root>/.reclaim.toml`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            tracing::debug!("No {} in {}, using defaults", CONFIG_FILE, root.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}
