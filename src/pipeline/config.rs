/// Configuration for pipeline behavior
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub error_strategy: ErrorStrategy,
    pub buffer_size: usize,
    pub max_line_length: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            error_strategy: ErrorStrategy::Skip,
            buffer_size: 65536,       // 64KB
            max_line_length: 1048576, // 1MB
        }
    }
}

/// Simple error handling strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStrategy {
    /// Skip problematic records and continue processing
    Skip,
    /// Stop processing on first error
    FailFast,
}
