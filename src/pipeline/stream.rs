// src/pipeline/stream.rs
use std::io::BufRead;
use std::time::Instant;

use crate::error::ProcessingError;
use crate::input::RecordParser;
use crate::pipeline::config::{ErrorStrategy, PipelineConfig};
use crate::pipeline::context::{PipelineContext, ProcessResult, ProcessingStats};
use crate::plugin::OutputPlugin;
use tracing::{debug, warn};

/// Main pipeline orchestrator: parses input lines into records and hands them
/// to a started output plugin.
pub struct StreamPipeline {
    parser: Box<dyn RecordParser>,
    plugin: Box<dyn OutputPlugin>,
    context: PipelineContext,
    config: PipelineConfig,
    stats: ProcessingStats,
}

impl StreamPipeline {
    pub fn new(
        config: PipelineConfig,
        parser: Box<dyn RecordParser>,
        plugin: Box<dyn OutputPlugin>,
    ) -> Self {
        StreamPipeline {
            parser,
            plugin,
            context: PipelineContext::new(),
            config,
            stats: ProcessingStats::default(),
        }
    }

    pub fn plugin_mut(&mut self) -> &mut dyn OutputPlugin {
        self.plugin.as_mut()
    }

    /// Process a single file/stream
    pub fn process_stream<R: BufRead>(
        &mut self,
        input: R,
        filename: Option<&str>,
    ) -> Result<ProcessingStats, ProcessingError> {
        let start_time = Instant::now();

        self.context.file_name = filename.map(|s| s.to_string());
        self.context.line_number = 0;

        let mut file_stats = ProcessingStats::default();

        for line_result in input.lines() {
            let line = match line_result {
                Ok(line) => line,
                Err(e) => {
                    if e.kind() == std::io::ErrorKind::UnexpectedEof {
                        break;
                    }
                    return Err(ProcessingError::IoError(e));
                }
            };

            self.context.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            file_stats.records_processed += 1;

            if line.len() > self.config.max_line_length {
                let error = ProcessingError::LineTooLong {
                    length: line.len(),
                    max_length: self.config.max_line_length,
                };
                self.handle_error(&mut file_stats, error)?;
                continue;
            }

            let record = match self.parser.parse_line(&line) {
                Ok(record) => record,
                Err(message) => {
                    let error = ProcessingError::Input {
                        line: self.context.line_number,
                        message,
                    };
                    self.handle_error(&mut file_stats, error)?;
                    continue;
                }
            };

            match self.plugin.process(&record) {
                ProcessResult::Skip => {
                    file_stats.records_skipped += 1;
                }
                ProcessResult::Emitted { flushes, errors } => {
                    file_stats.entries_flushed += flushes;
                    for error in errors {
                        self.handle_error(&mut file_stats, error)?;
                    }
                }
                ProcessResult::Error { flushes, error } => {
                    file_stats.entries_flushed += flushes;
                    self.handle_error(&mut file_stats, error)?;
                }
            }
        }

        file_stats.processing_time = start_time.elapsed();
        debug!(
            file = self.context.file_name.as_deref().unwrap_or("<stdin>"),
            records = file_stats.records_processed,
            flushed = file_stats.entries_flushed,
            "stream finished"
        );

        self.stats.merge(&file_stats);
        Ok(file_stats)
    }

    fn handle_error(
        &self,
        stats: &mut ProcessingStats,
        error: ProcessingError,
    ) -> Result<(), ProcessingError> {
        stats.errors += 1;
        match self.config.error_strategy {
            ErrorStrategy::FailFast => Err(error),
            ErrorStrategy::Skip => {
                warn!(line = self.context.line_number, %error, "record failed");
                Ok(())
            }
        }
    }

    /// Get current accumulated stats
    pub fn get_stats(&self) -> &ProcessingStats {
        &self.stats
    }
}
