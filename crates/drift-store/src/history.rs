//! Per-identifier result files under the data directory.
//!
//! ```text
//! data/
//!   history-<safe-id>.json    append-only [{drift, pulse, date}, ...]
//!   last-run-<safe-id>.json   [{dependency, drift, pulse, ...}, ...] of the latest run
//!   index.json                {"<repository>#<path>": {drift, pulse, date}, ...}
//!   .locks/<safe-id>.lock     per-identifier append lock (git-ignored)
//! ```

use crate::{lock_file, write_atomic};
use drift_core::{safe_name, DependencyResult, DriftError, Summary};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Identifier → latest summary, in repository-list order.
pub type IndexRecord = IndexMap<String, Summary>;

const LOCKS_DIR: &str = ".locks";

#[derive(Debug, Clone)]
pub struct HistoryStore {
    data_dir: PathBuf,
}

impl HistoryStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn history_path(&self, identifier: &str) -> PathBuf {
        self.data_dir
            .join(format!("history-{}.json", safe_name(identifier)))
    }

    pub fn last_run_path(&self, identifier: &str) -> PathBuf {
        self.data_dir
            .join(format!("last-run-{}.json", safe_name(identifier)))
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join("index.json")
    }

    fn lock_path(&self, identifier: &str) -> PathBuf {
        self.data_dir
            .join(LOCKS_DIR)
            .join(format!("{}.lock", safe_name(identifier)))
    }

    /// Read the history of one identifier. A missing file is an empty history.
    ///
    /// Entries are kept as raw JSON so fields this tool does not know about
    /// survive a read-modify-write.
    pub fn load_history(&self, identifier: &str) -> Result<Vec<serde_json::Value>, DriftError> {
        read_history(&self.history_path(identifier))
    }

    /// Append one summary to the identifier's history, creating the file on
    /// first use. Holds the identifier's lock for the read-modify-write; a
    /// lock held by another process is a `Persist` error, not a wait.
    pub fn append_summary(&self, identifier: &str, summary: &Summary) -> Result<(), DriftError> {
        let _guard = self.lock(identifier)?;
        self.append_locked(identifier, summary)
    }

    fn append_locked(&self, identifier: &str, summary: &Summary) -> Result<(), DriftError> {
        let path = self.history_path(identifier);
        let mut history = read_history(&path)?;
        history.push(serde_json::to_value(summary).map_err(|e| DriftError::persist(&path, e))?);
        write_json(&path, &history)?;

        tracing::debug!(identifier, entries = history.len(), "history appended");
        Ok(())
    }

    /// Replace the last-run snapshot of one identifier.
    pub fn overwrite_last_run(
        &self,
        identifier: &str,
        results: &[DependencyResult],
    ) -> Result<(), DriftError> {
        write_json(&self.last_run_path(identifier), results)
    }

    /// Persist one successful entry: the snapshot first, then the history.
    ///
    /// Both writes happen under the identifier's lock. The snapshot is a
    /// plain overwrite and may be repeated; the history append is the last
    /// step so a failed entry never grows its history.
    pub fn save_result(
        &self,
        identifier: &str,
        summary: &Summary,
        results: &[DependencyResult],
    ) -> Result<(), DriftError> {
        let _guard = self.lock(identifier)?;
        self.overwrite_last_run(identifier, results)?;
        self.append_locked(identifier, summary)
    }

    /// Replace `index.json` with the summaries of this run.
    pub fn write_index(&self, index: &IndexRecord) -> Result<(), DriftError> {
        write_json(&self.index_path(), index)
    }

    /// Read `index.json`; a missing file is an empty index.
    pub fn load_index(&self) -> Result<IndexRecord, DriftError> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(IndexRecord::new());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| DriftError::persist(&path, e))?;
        serde_json::from_str(&content).map_err(|e| DriftError::persist(&path, e))
    }

    fn lock(&self, identifier: &str) -> Result<crate::LockGuard, DriftError> {
        let path = self.lock_path(identifier);
        let ignore = self.data_dir.join(LOCKS_DIR).join(".gitignore");
        if !ignore.exists() {
            write_atomic(&ignore, b"*\n").map_err(|e| DriftError::persist(&ignore, e))?;
        }
        lock_file(&path).map_err(|e| DriftError::persist(&path, e))
    }
}

fn read_history(path: &Path) -> Result<Vec<serde_json::Value>, DriftError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path).map_err(|e| DriftError::persist(path, e))?;
    match serde_json::from_str(&content) {
        Ok(serde_json::Value::Array(entries)) => Ok(entries),
        Ok(_) => Err(DriftError::persist(path, "history file is not a JSON array")),
        Err(e) => Err(DriftError::persist(path, format!("invalid history JSON: {e}"))),
    }
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), DriftError> {
    let data = serde_json::to_vec(value).map_err(|e| DriftError::persist(path, e))?;
    write_atomic(path, &data).map_err(|e| DriftError::persist(path, e))
}
