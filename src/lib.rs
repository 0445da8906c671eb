// src/lib.rs
pub mod config;
pub mod dispatch;
pub mod error;
pub mod field;
pub mod input;
pub mod pipeline;
pub mod plugin;
pub mod provider;
pub mod resolve;
pub mod sink;
pub mod template;
pub mod writer;

pub use error::*;

pub use config::{ConfigFile, Destination, PluginConfig};
pub use dispatch::{Identity, TemplateDispatcher};
pub use field::{FieldDescriptor, FieldType, RawValue, Record};
pub use input::{JsonlRecordParser, RecordParser};
pub use pipeline::config::{ErrorStrategy, PipelineConfig};
pub use pipeline::context::{ProcessResult, ProcessingStats};
pub use pipeline::stream::StreamPipeline;
pub use plugin::{DsondePlugin, OutputPlugin, SinkKind};
pub use provider::{FieldProvider, StaticFieldProvider};
pub use resolve::{resolve, ResolvedConfig};
pub use sink::{LogSink, MemorySink, StdoutSink, UdpLogSink};
