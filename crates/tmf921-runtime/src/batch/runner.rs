//! Sequential batch runner with periodic checkpoints.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use tmf921_core::{InputIntent, ValidationStatus};

use super::checkpoint::{CheckpointError, CheckpointStore};
use super::output::{fallback_entries, write_outputs, Dataset, DatasetMetadata, OutputError};
use super::state::{ResumeOutcome, RunState};
use crate::translator::TranslateIntent;
use crate::usage::{LlmUsage, UsageTracker};

/// Run-level failures. Everything here aborts the run.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("start_index {start_index} is beyond the {len} available intents")]
    StartIndexOutOfRange { start_index: usize, len: usize },

    #[error("checkpoint_interval must be greater than 0")]
    InvalidInterval,
}

/// Outcome of one call to [`BatchRunner::run`].
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Results held at the end, including any loaded from a checkpoint
    pub total: usize,
    pub succeeded: usize,
    /// Results whose status is not `valid`
    pub failed: usize,
    pub fallback: usize,
    /// `None` when the run was interrupted
    pub output_path: Option<PathBuf>,
    pub fallback_path: Option<PathBuf>,
    pub checkpoint_path: PathBuf,
    pub checkpoints_written: usize,
    pub interrupted: bool,
    pub usage: BTreeMap<String, LlmUsage>,
}

/// Drives a [`TranslateIntent`] over an ordered intent collection.
///
/// Items are processed one at a time, in input order. Cancellation is
/// observed between items; the in-flight item always completes first and
/// its result is flushed to the checkpoint before `run` returns.
pub struct BatchRunner {
    translator: Arc<dyn TranslateIntent>,
    store: CheckpointStore,
    output_dir: PathBuf,
    provider: String,
    max_items: Option<usize>,
    usage: Option<Arc<UsageTracker>>,
    cancel: Arc<AtomicBool>,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("checkpoint", &self.store.path())
            .field("output_dir", &self.output_dir)
            .field("provider", &self.provider)
            .field("max_items", &self.max_items)
            .finish()
    }
}

impl BatchRunner {
    pub fn new(
        translator: Arc<dyn TranslateIntent>,
        store: CheckpointStore,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            translator,
            store,
            output_dir: output_dir.into(),
            provider: String::new(),
            max_items: None,
            usage: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Provider name recorded in the output metadata.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_max_items(mut self, max_items: Option<usize>) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn with_usage(mut self, usage: Arc<UsageTracker>) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Share an externally owned cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Flag that stops the run at the next item boundary once set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn initial_state(&self, start_index: usize) -> Result<RunState, BatchError> {
        if start_index == 0 {
            if self.store.path().exists() {
                warn!(
                    checkpoint = %self.store.path().display(),
                    "Starting from position 0, the existing checkpoint will be replaced at the first write"
                );
            }
            return Ok(RunState::new(0));
        }
        match self.store.load()? {
            Some(record) => {
                let (state, outcome) = RunState::resume(record, start_index)?;
                match outcome {
                    ResumeOutcome::Loaded => info!(
                        checkpoint = %self.store.path().display(),
                        loaded = state.results().len(),
                        start_index,
                        "Resuming from checkpoint"
                    ),
                    ResumeOutcome::Discarded => warn!(
                        checkpoint = %self.store.path().display(),
                        start_index,
                        "Checkpoint begins after the requested start, ignoring it"
                    ),
                }
                Ok(state)
            }
            None => {
                warn!(
                    checkpoint = %self.store.path().display(),
                    start_index,
                    "No checkpoint found, earlier results will be missing from the output"
                );
                Ok(RunState::new(start_index))
            }
        }
    }

    fn write_checkpoint(&self, state: &mut RunState) -> Result<(), BatchError> {
        let record = state.to_record();
        self.store.save(&record)?;
        state.mark_checkpointed();
        info!(
            path = %self.store.path().display(),
            last_completed_index = record.last_completed_index,
            results = record.results_so_far.len(),
            failed = record.failed_ids.len(),
            "Checkpoint written"
        );
        Ok(())
    }

    /// Translate `intents[start_index..]` in order.
    ///
    /// A `start_index` above zero resumes from the stored checkpoint when
    /// one exists. Checkpoint and output I/O failures abort the run; item
    /// failures never do.
    pub async fn run(
        &self,
        intents: &[InputIntent],
        start_index: usize,
        checkpoint_interval: usize,
    ) -> Result<RunSummary, BatchError> {
        if checkpoint_interval == 0 {
            return Err(BatchError::InvalidInterval);
        }
        if start_index > intents.len() {
            return Err(BatchError::StartIndexOutOfRange {
                start_index,
                len: intents.len(),
            });
        }

        let mut state = self.initial_state(start_index)?;
        let end = match self.max_items {
            Some(max) => start_index.saturating_add(max).min(intents.len()),
            None => intents.len(),
        };
        let generation_date = Utc::now();
        info!(start_index, end, checkpoint_interval, "Batch run started");

        let mut interrupted = false;
        for (position, intent) in intents.iter().enumerate().take(end).skip(start_index) {
            if self.cancel.load(Ordering::Acquire) {
                interrupted = true;
                break;
            }

            let result = self.translator.translate(intent).await;
            debug!(
                intent_id = intent.id,
                position,
                status = %result.validation_status,
                "Item recorded"
            );
            state.record(result);

            if state.checkpoint_due(checkpoint_interval) {
                self.write_checkpoint(&mut state)?;
            }
        }

        // A run that translated nothing leaves any existing checkpoint untouched
        if state.processed_this_run() > 0 && state.has_unsaved_progress() {
            self.write_checkpoint(&mut state)?;
        }

        let (output_path, fallback_path) = if interrupted {
            warn!(
                next_index = state.next_index(),
                "Run interrupted, resume with --start-index {}",
                state.next_index()
            );
            (None, None)
        } else {
            let dataset = Dataset {
                metadata: DatasetMetadata {
                    generation_date,
                    completion_date: Utc::now(),
                    start_index: state.start_index(),
                    end_index: state.next_index(),
                    total: state.results().len(),
                    valid: state.count(ValidationStatus::Valid),
                    fallback: state.count(ValidationStatus::Fallback),
                    invalid: state.count(ValidationStatus::Invalid),
                    provider: self.provider.clone(),
                },
                results: state.results().to_vec(),
            };
            let fallbacks = fallback_entries(state.results(), intents);
            let (results_path, fallback_path) =
                write_outputs(&self.output_dir, &dataset, &fallbacks)?;
            (Some(results_path), Some(fallback_path))
        };

        let succeeded = state.count(ValidationStatus::Valid);
        let summary = RunSummary {
            total: state.results().len(),
            succeeded,
            failed: state.results().len() - succeeded,
            fallback: state.count(ValidationStatus::Fallback),
            output_path,
            fallback_path,
            checkpoint_path: self.store.path().to_path_buf(),
            checkpoints_written: state.checkpoints_written(),
            interrupted,
            usage: self
                .usage
                .as_ref()
                .map(|u| u.snapshot())
                .unwrap_or_default(),
        };

        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            fallback = summary.fallback,
            processed = state.processed_this_run(),
            checkpoints = summary.checkpoints_written,
            interrupted = summary.interrupted,
            "Batch run finished"
        );
        Ok(summary)
    }
}
