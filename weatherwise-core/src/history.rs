use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::config::project_dirs;

/// How many recent searches are kept.
pub const HISTORY_LIMIT: usize = 5;

/// Recently searched locations, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchHistory {
    entries: Vec<String>,
}

impl SearchHistory {
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a search. A repeated location moves to the end instead of being duplicated.
    pub fn record(&mut self, location: &str) {
        let location = location.trim();
        if location.is_empty() {
            return;
        }

        self.entries
            .retain(|existing| !existing.eq_ignore_ascii_case(location));
        self.entries.push(location.to_string());

        if self.entries.len() > HISTORY_LIMIT {
            let excess = self.entries.len() - HISTORY_LIMIT;
            self.entries.drain(..excess);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Load history from disk, or return an empty history if there is none yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::history_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read history file: {}", path.display()))?;

        let mut history: SearchHistory = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse history file: {}", path.display()))?;

        // Files written by hand may be longer than the limit.
        if history.entries.len() > HISTORY_LIMIT {
            let excess = history.entries.len() - HISTORY_LIMIT;
            history.entries.drain(..excess);
        }

        Ok(history)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::history_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create history directory: {}", parent.display())
            })?;
        }

        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize search history")?;

        fs::write(path, json)
            .with_context(|| format!("Failed to write history file: {}", path.display()))?;

        Ok(())
    }

    pub fn history_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.data_dir().join("history.json"))
    }
}
