//! Flat directory of product files, one `{ASIN}.json` per product.

use crate::amazon::models::ProductRecord;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ProductStore {
    dir: PathBuf,
}

impl ProductStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, asin: &str) -> PathBuf {
        self.dir.join(format!("{}.json", asin))
    }

    pub fn exists(&self, asin: &str) -> bool {
        self.path_for(asin).exists()
    }

    /// Writes the record, replacing any earlier file for the same ASIN.
    pub fn save(&self, record: &ProductRecord) -> Result<PathBuf> {
        let Some(asin) = record.id.as_asin() else {
            anyhow::bail!("Refusing to persist product without an ASIN ({})", record.id);
        };

        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create products directory: {}", self.dir.display()))?;

        let path = self.path_for(asin);
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Saved {}", path.display());
        Ok(path)
    }
}
