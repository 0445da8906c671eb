// src/pipeline.rs
pub mod config;
pub mod context;
pub mod stream;

pub use config::{ErrorStrategy, PipelineConfig};
pub use context::{PipelineContext, ProcessResult, ProcessingStats};
pub use stream::StreamPipeline;
