//! JSONL-backed result store with in-memory caching.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::store::{LastSuccess, ResultStore};
use crate::error::{CodemaxError, Result};

const SUCCESSES_FILE: &str = "successes.jsonl";

/// Append-only log of converged programs; the newest line is the last success.
pub struct JsonlResultStore {
    path: PathBuf,
    cache: RwLock<Option<Option<LastSuccess>>>,
}

impl JsonlResultStore {
    /// Create a store in `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(SUCCESSES_FILE),
            cache: RwLock::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every recorded success, oldest first. Unparseable lines are skipped.
    pub fn all(&self) -> Result<Vec<LastSuccess>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LastSuccess>(&line) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("Skipping line {} of {}: {}", index + 1, self.path.display(), e),
            }
        }
        Ok(records)
    }

    fn append_to_file(&self, record: &LastSuccess) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(record)?)?;
        Ok(())
    }
}

impl ResultStore for JsonlResultStore {
    fn put_last_success(&self, success: LastSuccess) -> Result<()> {
        // Held across the append so the cache always matches the last line
        let mut cache = self.cache.write().map_err(|e| CodemaxError::Storage(e.to_string()))?;
        self.append_to_file(&success)?;
        *cache = Some(Some(success));
        Ok(())
    }

    fn get_last_success(&self) -> Result<Option<LastSuccess>> {
        {
            let cache = self.cache.read().map_err(|e| CodemaxError::Storage(e.to_string()))?;
            if let Some(loaded) = cache.as_ref() {
                return Ok(loaded.clone());
            }
        }

        let last = self.all()?.pop();
        let mut cache = self.cache.write().map_err(|e| CodemaxError::Storage(e.to_string()))?;
        *cache = Some(last.clone());
        Ok(last)
    }
}

impl std::fmt::Debug for JsonlResultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlResultStore").field("path", &self.path).finish()
    }
}
