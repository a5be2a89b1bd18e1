//! Per-market record of completed categories, so an interrupted run can resume.

use crate::amazon::markets::Market;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressCheckpoint {
    pub market: Market,
    pub completed: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// Reads and writes `progress_{market}.json` in a state directory.
pub struct CheckpointStore {
    market: Market,
    path: PathBuf,
}

impl CheckpointStore {
    pub fn for_market(dir: impl AsRef<Path>, market: Market) -> Self {
        let path = dir.as_ref().join(format!("progress_{}.json", market));
        Self { market, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Completed category ids. A missing or unreadable file means none.
    pub fn load(&self) -> HashSet<String> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No checkpoint at {}", self.path.display());
                return HashSet::new();
            }
            Err(e) => {
                warn!("Failed to read checkpoint {}: {}", self.path.display(), e);
                return HashSet::new();
            }
        };

        match serde_json::from_str::<ProgressCheckpoint>(&content) {
            Ok(checkpoint) => {
                if checkpoint.market != self.market {
                    warn!(
                        "Checkpoint {} belongs to market {}, expected {}",
                        self.path.display(),
                        checkpoint.market,
                        self.market
                    );
                }
                debug!("Loaded {} completed categories", checkpoint.completed.len());
                checkpoint.completed.into_iter().collect()
            }
            Err(e) => {
                warn!("Ignoring corrupt checkpoint {}: {}", self.path.display(), e);
                HashSet::new()
            }
        }
    }

    pub fn save(&self, completed: &HashSet<String>) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let mut ids: Vec<String> = completed.iter().cloned().collect();
        ids.sort();
        let checkpoint = ProgressCheckpoint { market: self.market, completed: ids, updated_at: Utc::now() };

        let json = serde_json::to_string_pretty(&checkpoint)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write checkpoint: {}", self.path.display()))?;
        debug!("Checkpoint saved: {} categories", completed.len());
        Ok(())
    }
}
