use crate::error::ProcessingError;
use std::time::Duration;

/// Result of handing a single record to the output plugin
#[derive(Debug)]
pub enum ProcessResult {
    /// Neither instance field is present; nothing was emitted
    Skip,
    /// Every present identity was processed. `errors` holds emissions that were
    /// skipped because their identity did not parse.
    Emitted {
        flushes: usize,
        errors: Vec<ProcessingError>,
    },
    /// The record was aborted after `flushes` flush events
    Error {
        flushes: usize,
        error: ProcessingError,
    },
}

impl ProcessResult {
    /// Number of flush events the record produced.
    pub fn flushes(&self) -> usize {
        match self {
            ProcessResult::Skip => 0,
            ProcessResult::Emitted { flushes, .. } | ProcessResult::Error { flushes, .. } => {
                *flushes
            }
        }
    }

    pub fn is_error(&self) -> bool {
        match self {
            ProcessResult::Skip => false,
            ProcessResult::Emitted { errors, .. } => !errors.is_empty(),
            ProcessResult::Error { .. } => true,
        }
    }
}

/// Runtime statistics
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub records_processed: usize,
    pub records_skipped: usize,
    pub entries_flushed: usize,
    pub errors: usize,
    pub processing_time: Duration,
}

impl ProcessingStats {
    pub fn merge(&mut self, other: &ProcessingStats) {
        self.records_processed += other.records_processed;
        self.records_skipped += other.records_skipped;
        self.entries_flushed += other.entries_flushed;
        self.errors += other.errors;
        self.processing_time += other.processing_time;
    }
}

/// Position of the pipeline within its current input
#[derive(Debug, Default)]
pub struct PipelineContext {
    pub line_number: usize,
    pub file_name: Option<String>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }
}
