//! Mutable progress of one batch run.

use std::collections::BTreeSet;

use chrono::Utc;

use tmf921_core::{GeneratedIntent, ValidationStatus};

use super::checkpoint::{CheckpointError, CheckpointRecord};

/// Progress counters and accumulated results, owned by the batch runner.
#[derive(Debug, Clone)]
pub struct RunState {
    /// First position covered by `results`
    start_index: usize,
    /// Next position to process
    next_index: usize,
    results: Vec<GeneratedIntent>,
    failed_ids: BTreeSet<u64>,
    /// Items processed by this run, excluding anything loaded
    processed_this_run: usize,
    checkpoints_written: usize,
    /// `next_index` at the last checkpoint write
    checkpointed_at: Option<usize>,
}

impl RunState {
    /// Fresh state starting at `start_index`.
    pub fn new(start_index: usize) -> Self {
        Self {
            start_index,
            next_index: start_index,
            results: Vec::new(),
            failed_ids: BTreeSet::new(),
            processed_this_run: 0,
            checkpoints_written: 0,
            checkpointed_at: None,
        }
    }

    /// State resuming at `start_index` on top of a prior checkpoint.
    ///
    /// Prior results at or after `start_index` are dropped because they
    /// will be produced again. A checkpoint that begins after
    /// `start_index` is discarded. A checkpoint that ends before
    /// `start_index` would leave positions unprocessed and is rejected.
    pub fn resume(
        record: CheckpointRecord,
        start_index: usize,
    ) -> Result<(Self, ResumeOutcome), CheckpointError> {
        if record.start_index > start_index {
            return Ok((Self::new(start_index), ResumeOutcome::Discarded));
        }
        if record.last_completed_index < start_index {
            return Err(CheckpointError::Inconsistent(format!(
                "checkpoint ends at position {} but resume requested at {}; positions {}..{} would never be processed",
                record.last_completed_index, start_index, record.last_completed_index, start_index
            )));
        }

        let mut results = record.results_so_far;
        results.truncate(start_index - record.start_index);
        let failed_ids = results
            .iter()
            .filter(|r| !r.is_valid())
            .map(|r| r.source_id)
            .collect();

        let state = Self {
            start_index: record.start_index,
            next_index: start_index,
            results,
            failed_ids,
            processed_this_run: 0,
            checkpoints_written: 0,
            checkpointed_at: None,
        };
        Ok((state, ResumeOutcome::Loaded))
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn processed_this_run(&self) -> usize {
        self.processed_this_run
    }

    pub fn checkpoints_written(&self) -> usize {
        self.checkpoints_written
    }

    pub fn results(&self) -> &[GeneratedIntent] {
        &self.results
    }

    pub fn into_results(self) -> Vec<GeneratedIntent> {
        self.results
    }

    /// Record the artifact for position `next_index` and advance.
    pub fn record(&mut self, result: GeneratedIntent) {
        if !result.is_valid() {
            self.failed_ids.insert(result.source_id);
        }
        self.results.push(result);
        self.next_index += 1;
        self.processed_this_run += 1;
    }

    /// Whether a periodic checkpoint is due after the latest item.
    pub fn checkpoint_due(&self, interval: usize) -> bool {
        interval > 0 && self.processed_this_run > 0 && self.processed_this_run % interval == 0
    }

    /// Whether anything was recorded since the last checkpoint write.
    pub fn has_unsaved_progress(&self) -> bool {
        self.checkpointed_at != Some(self.next_index)
    }

    pub fn mark_checkpointed(&mut self) {
        self.checkpointed_at = Some(self.next_index);
        self.checkpoints_written += 1;
    }

    /// Snapshot for persistence.
    pub fn to_record(&self) -> CheckpointRecord {
        CheckpointRecord {
            start_index: self.start_index,
            last_completed_index: self.next_index,
            results_so_far: self.results.clone(),
            failed_ids: self.failed_ids.clone(),
            written_at: Utc::now(),
        }
    }

    pub fn count(&self, status: ValidationStatus) -> usize {
        self.results
            .iter()
            .filter(|r| r.validation_status == status)
            .count()
    }

    /// First position covered by the accumulated results.
    pub fn start_index(&self) -> usize {
        self.start_index
    }
}

/// How a prior checkpoint was applied on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    Loaded,
    /// The checkpoint began after the requested start
    Discarded,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(id: u64, status: ValidationStatus) -> GeneratedIntent {
        GeneratedIntent {
            source_id: id,
            structured_document: json!({}),
            validation_status: status,
            diagnostics: Vec::new(),
            provider_used: "mock".to_string(),
            generated_at: Utc::now(),
        }
    }

    fn record(start: usize, count: usize) -> CheckpointRecord {
        let results: Vec<_> = (start..start + count)
            .map(|p| result(p as u64 + 1, ValidationStatus::Valid))
            .collect();
        CheckpointRecord {
            start_index: start,
            last_completed_index: start + count,
            results_so_far: results,
            failed_ids: BTreeSet::new(),
            written_at: Utc::now(),
        }
    }

    #[test]
    fn test_checkpoint_cadence() {
        let mut state = RunState::new(0);
        let mut due = Vec::new();
        for id in 1..=120 {
            state.record(result(id, ValidationStatus::Valid));
            if state.checkpoint_due(50) {
                due.push(state.next_index());
                state.mark_checkpointed();
            }
        }
        assert_eq!(due, vec![50, 100]);
        assert!(state.has_unsaved_progress());
    }

    #[test]
    fn test_failed_ids_tracked() {
        let mut state = RunState::new(0);
        state.record(result(1, ValidationStatus::Valid));
        state.record(result(2, ValidationStatus::Fallback));
        let record = state.to_record();
        assert_eq!(record.failed_ids, BTreeSet::from([2]));
        assert!(record.check().is_ok());
        assert_eq!(state.count(ValidationStatus::Fallback), 1);
    }

    #[test]
    fn test_resume_at_checkpoint_end() {
        let (state, outcome) = RunState::resume(record(0, 30), 30).unwrap();
        assert_eq!(outcome, ResumeOutcome::Loaded);
        assert_eq!(state.results().len(), 30);
        assert_eq!(state.next_index(), 30);
        assert_eq!(state.processed_this_run(), 0);
    }

    #[test]
    fn test_resume_inside_checkpoint_truncates() {
        let (state, outcome) = RunState::resume(record(0, 30), 20).unwrap();
        assert_eq!(outcome, ResumeOutcome::Loaded);
        assert_eq!(state.results().len(), 20);
        assert!(state.to_record().check().is_ok());
    }

    #[test]
    fn test_resume_with_gap_rejected() {
        assert!(matches!(
            RunState::resume(record(0, 10), 15),
            Err(CheckpointError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_resume_discards_later_checkpoint() {
        let (state, outcome) = RunState::resume(record(40, 10), 5).unwrap();
        assert_eq!(outcome, ResumeOutcome::Discarded);
        assert!(state.results().is_empty());
        assert_eq!(state.next_index(), 5);
    }
}
