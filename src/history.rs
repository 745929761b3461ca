//! Per-file fix history, kept at `~/.qcompat/history.json`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixRecord {
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub rules: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct Entries(BTreeMap<String, Vec<FixRecord>>);

pub struct History {
    path: PathBuf,
    max_entries: usize,
}

impl History {
    pub fn new(path: PathBuf, max_entries: usize) -> Self {
        Self { path, max_entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records for every file. An unreadable history counts as empty.
    pub fn load(&self) -> BTreeMap<String, Vec<FixRecord>> {
        let Ok(bytes) = std::fs::read(&self.path) else {
            return BTreeMap::new();
        };
        match serde_json::from_slice::<Entries>(&bytes) {
            Ok(entries) => entries.0,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "ignoring corrupt history: {e}");
                BTreeMap::new()
            }
        }
    }

    pub fn record(&self, file: &Path, rules: &[String]) -> Result<()> {
        let mut entries = self.load();
        let records = entries.entry(file.display().to_string()).or_default();
        records.push(FixRecord {
            at: Utc::now(),
            rules: rules.to_vec(),
        });
        if records.len() > self.max_entries {
            let excess = records.len() - self.max_entries;
            *records = records.split_off(excess);
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create history directory")?;
        }
        let json = serde_json::to_vec_pretty(&Entries(entries))?;
        std::fs::write(&self.path, json).context("Failed to write history")?;
        Ok(())
    }
}
