//! Checkpoint persistence.
//!
//! One JSON file, overwritten atomically: the record is written to a
//! temporary file in the same directory and renamed over the target, so a
//! crash mid-write leaves the previous checkpoint intact.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use tmf921_core::GeneratedIntent;

/// Checkpoint I/O failures. Fatal to the run.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Inconsistent checkpoint: {0}")]
    Inconsistent(String),
}

/// Durable snapshot of run progress.
///
/// Positions are indices into the input collection. The record covers
/// `start_index..last_completed_index`, one result per position, so the
/// invariant checked on load is
/// `last_completed_index - start_index == results_so_far.len()`.
///
/// `failed_ids` is an index over `results_so_far`, not a second store:
/// it names the covered items whose status is not `valid`, and those items
/// keep their slot in `results_so_far` so output order stays positional.
/// A count of `results_so_far.len() + failed_ids.len()` therefore double
/// counts every non-valid item and is not a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// First position covered
    pub start_index: usize,

    /// End of the covered range (exclusive)
    pub last_completed_index: usize,

    pub results_so_far: Vec<GeneratedIntent>,

    pub failed_ids: BTreeSet<u64>,

    pub written_at: DateTime<Utc>,
}

impl CheckpointRecord {
    pub fn empty(start_index: usize) -> Self {
        Self {
            start_index,
            last_completed_index: start_index,
            results_so_far: Vec::new(),
            failed_ids: BTreeSet::new(),
            written_at: Utc::now(),
        }
    }

    /// Check the positional invariants.
    pub fn check(&self) -> Result<(), CheckpointError> {
        let covered = self
            .last_completed_index
            .checked_sub(self.start_index)
            .ok_or_else(|| {
                CheckpointError::Inconsistent(format!(
                    "last_completed_index {} precedes start_index {}",
                    self.last_completed_index, self.start_index
                ))
            })?;

        if covered != self.results_so_far.len() {
            return Err(CheckpointError::Inconsistent(format!(
                "range {}..{} covers {} positions but {} results are stored",
                self.start_index,
                self.last_completed_index,
                covered,
                self.results_so_far.len()
            )));
        }

        let non_valid: BTreeSet<u64> = self
            .results_so_far
            .iter()
            .filter(|r| !r.is_valid())
            .map(|r| r.source_id)
            .collect();
        if non_valid != self.failed_ids {
            return Err(CheckpointError::Inconsistent(
                "failed_ids do not match the non-valid results".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reads and writes the checkpoint file for one run.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Load the checkpoint, or `None` if no file exists.
    pub fn load(&self) -> Result<Option<CheckpointRecord>, CheckpointError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        let record: CheckpointRecord = serde_json::from_str(&contents)?;
        record.check()?;
        Ok(Some(record))
    }

    /// Atomically replace the checkpoint file.
    pub fn save(&self, record: &CheckpointRecord) -> Result<(), CheckpointError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let mut file = NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        serde_json::to_writer_pretty(&mut file, record)?;
        file.flush().map_err(|e| self.io_error(e))?;
        file.as_file().sync_all().map_err(|e| self.io_error(e))?;
        file.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        Ok(())
    }
}
