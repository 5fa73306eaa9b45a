//! Last-used settings of the web UI, persisted as a small JSON document.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub prompt: String,
}

/// File-backed settings. Every save replaces the whole document.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved settings, or defaults when the file is missing or unreadable.
    pub fn load(&self) -> Settings {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No saved settings at {:?}: {}", self.path, e);
                return Settings::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Ignoring corrupt settings file {:?}: {}", self.path, e);
            Settings::default()
        })
    }

    /// Write to a fresh sibling temp file, then rename it over the target.
    /// Concurrent saves each get their own temp file; the last rename wins.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string_pretty(settings)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {:?}", dir))?;
        tmp.write_all(json.as_bytes())
            .with_context(|| format!("Failed to write settings: {:?}", tmp.path()))?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace settings: {:?}", self.path))?;
        debug!("Saved settings to {:?}", self.path);
        Ok(())
    }
}
