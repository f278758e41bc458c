//! Batch Runner and Checkpoint Manager.
//!
//! A single worker walks the input collection in order, asks a
//! [`TranslateIntent`](crate::translator::TranslateIntent) for each item and
//! persists progress every `checkpoint_interval` items. Progress lives in an
//! explicit [`RunState`] owned by the [`BatchRunner`]; the checkpoint file
//! and output artifacts are written by nothing else.

mod checkpoint;
mod output;
mod runner;
mod state;

pub use checkpoint::{CheckpointError, CheckpointRecord, CheckpointStore};
pub use output::{
    fallback_entries, write_outputs, Dataset, DatasetMetadata, FallbackEntry, OutputError,
    FALLBACK_FILE, RESULTS_FILE,
};
pub use runner::{BatchError, BatchRunner, RunSummary};
pub use state::{ResumeOutcome, RunState};
